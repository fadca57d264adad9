use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::store::{read_json, write_json};
use crate::utils::error::StoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Front-end preferences. The core only reads `logging_enabled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
    pub font_family: String,
    pub font_size: u32,
    pub logging_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_family: "Segoe UI".to_string(),
            font_size: 12,
            logging_enabled: true,
        }
    }
}

#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    preferences: Preferences,
}

impl PreferencesStore {
    /// Load preferences from `path`, falling back to defaults when the file is missing.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let preferences = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, preferences })
    }

    pub fn save(&self) -> Result<(), StoreError> {
        write_json(&self.path, &self.preferences)
    }

    pub fn get(&self) -> &Preferences {
        &self.preferences
    }

    /// Turn logging on or off and persist the change.
    pub fn set_logging_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        self.preferences.logging_enabled = enabled;
        self.save()
    }

    pub fn logging_enabled(&self) -> bool {
        self.preferences.logging_enabled
    }
}

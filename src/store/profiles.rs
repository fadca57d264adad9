//! Connection profiles and their JSON store.
//!
//! The store file is a flat JSON object mapping the profile name to its
//! record. Files written by the older desktop connector use slightly different
//! keys (`bootstrap_servers`, `ssl_cafile`, ...); those are accepted on load
//! and rewritten with the current names on the next save.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::{read_json, write_json};
use crate::utils::error::StoreError;

pub const DEFAULT_PROFILE_NAME: &str = "Default Server";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityProtocol {
    #[default]
    #[serde(rename = "PLAINTEXT")]
    Plaintext,
    #[serde(rename = "SASL_PLAINTEXT")]
    SaslPlaintext,
    #[serde(rename = "SASL_SSL")]
    SaslSsl,
    #[serde(rename = "SSL")]
    Ssl,
}

impl SecurityProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "PLAINTEXT",
            SecurityProtocol::SaslPlaintext => "SASL_PLAINTEXT",
            SecurityProtocol::SaslSsl => "SASL_SSL",
            SecurityProtocol::Ssl => "SSL",
        }
    }
}

impl fmt::Display for SecurityProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PLAINTEXT" => Ok(SecurityProtocol::Plaintext),
            "SASL_PLAINTEXT" => Ok(SecurityProtocol::SaslPlaintext),
            "SASL_SSL" => Ok(SecurityProtocol::SaslSsl),
            "SSL" => Ok(SecurityProtocol::Ssl),
            other => Err(format!(
                "unknown security protocol '{other}' (expected PLAINTEXT, SASL_PLAINTEXT, SASL_SSL or SSL)"
            )),
        }
    }
}

/// Named connection configuration for a broker endpoint.
///
/// The name is the key in the store file and is not repeated in the record.
/// Optional fields may hold empty strings; they are treated as unset when the
/// connection parameters are derived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(skip)]
    pub name: String,
    #[serde(alias = "bootstrap_servers")]
    pub bootstrap_address: String,
    #[serde(default)]
    pub security_protocol: SecurityProtocol,
    #[serde(default)]
    pub sasl_mechanism: Option<String>,
    #[serde(default)]
    pub sasl_username: Option<String>,
    #[serde(default)]
    pub sasl_password: Option<String>,
    #[serde(default, alias = "ssl_cafile")]
    pub tls_ca_path: Option<String>,
    #[serde(default, alias = "ssl_certfile")]
    pub tls_cert_path: Option<String>,
    #[serde(default, alias = "ssl_keyfile")]
    pub tls_key_path: Option<String>,
}

impl ConnectionProfile {
    /// A plaintext profile with no credentials.
    pub fn new(name: impl Into<String>, bootstrap_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bootstrap_address: bootstrap_address.into(),
            ..Default::default()
        }
    }

    pub fn with_security(mut self, protocol: SecurityProtocol) -> Self {
        self.security_protocol = protocol;
        self
    }

    pub fn with_sasl(
        mut self,
        mechanism: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        self.sasl_mechanism = mechanism;
        self.sasl_username = username;
        self.sasl_password = password;
        self
    }

    pub fn with_tls(
        mut self,
        ca_path: Option<String>,
        cert_path: Option<String>,
        key_path: Option<String>,
    ) -> Self {
        self.tls_ca_path = ca_path;
        self.tls_cert_path = cert_path;
        self.tls_key_path = key_path;
        self
    }

    /// The profile a fresh installation starts with.
    pub fn default_server() -> Self {
        Self::new(DEFAULT_PROFILE_NAME, "localhost:9092")
    }
}

/// Profiles keyed by name, persisted to a JSON file.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    profiles: BTreeMap<String, ConnectionProfile>,
}

impl ProfileStore {
    /// Load the store at `path`. A missing file yields the default profile only.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let profiles = match read_json::<BTreeMap<String, ConnectionProfile>>(&path)? {
            Some(mut profiles) => {
                for (name, profile) in profiles.iter_mut() {
                    profile.name = name.clone();
                }
                debug!(path = %path.display(), count = profiles.len(), "loaded profiles");
                profiles
            }
            None => {
                let default = ConnectionProfile::default_server();
                BTreeMap::from([(default.name.clone(), default)])
            }
        };
        Ok(Self { path, profiles })
    }

    pub fn save(&self) -> Result<(), StoreError> {
        write_json(&self.path, &self.profiles)?;
        info!(path = %self.path.display(), count = self.profiles.len(), "saved profiles");
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&ConnectionProfile> {
        self.profiles.get(name)
    }

    /// First profile in name order, the one selected when nothing else is chosen.
    pub fn first(&self) -> Option<&ConnectionProfile> {
        self.profiles.values().next()
    }

    pub fn add(&mut self, profile: ConnectionProfile) -> Result<(), StoreError> {
        let name = profile.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::EmptyProfileName);
        }
        if self.profiles.contains_key(&name) {
            return Err(StoreError::DuplicateProfile(name));
        }
        self.profiles.insert(
            name.clone(),
            ConnectionProfile {
                name,
                ..profile
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<ConnectionProfile> {
        self.profiles.remove(name)
    }
}

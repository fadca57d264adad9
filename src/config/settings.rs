use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes client timing, file locations and the embedded broker policy.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub client: ClientSettings,
    pub storage: StorageSettings,
    pub local: LocalSettings,
}

/// Timing and sizing knobs shared by the session and the workers.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ClientSettings {
    /// How long `publish` waits for the broker acknowledgment.
    pub publish_timeout_secs: u64,
    /// Upper bound for admin requests and metadata fetches.
    pub admin_timeout_secs: u64,
    /// Slice length of a single worker poll; bounds how long a stop can lag.
    pub poll_interval_ms: u64,
    /// Maximum number of records an overview fetch returns.
    pub overview_cap: usize,
    /// An overview ends once no record arrived for this long.
    pub overview_idle_timeout_ms: u64,
    /// Consumer group of the streaming consumer. Overviews use throwaway groups.
    pub consumer_group: String,
}

impl ClientSettings {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn admin_timeout(&self) -> Duration {
        Duration::from_secs(self.admin_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn overview_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.overview_idle_timeout_ms)
    }
}

/// Where the profile and preference files and the log files live.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageSettings {
    pub profiles_path: String,
    pub preferences_path: String,
    pub log_dir: Option<String>,
}

/// Policy of the embedded `local://` broker.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LocalSettings {
    /// Oldest records beyond this count are dropped on append.
    pub max_records_per_topic: Option<usize>,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional. Missing values are filled from defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub client: Option<PartialClientSettings>,
    pub storage: Option<PartialStorageSettings>,
    pub local: Option<PartialLocalSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialClientSettings {
    pub publish_timeout_secs: Option<u64>,
    pub admin_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub overview_cap: Option<usize>,
    pub overview_idle_timeout_ms: Option<u64>,
    pub consumer_group: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStorageSettings {
    pub profiles_path: Option<String>,
    pub preferences_path: Option<String>,
    pub log_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLocalSettings {
    pub max_records_per_topic: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client: ClientSettings {
                publish_timeout_secs: 10,
                admin_timeout_secs: 30,
                poll_interval_ms: 100,
                overview_cap: 10,
                overview_idle_timeout_ms: 5000,
                consumer_group: "boarlink".to_string(),
            },
            storage: StorageSettings {
                profiles_path: "servers.conf".to_string(),
                preferences_path: "settings.conf".to_string(),
                log_dir: None,
            },
            local: LocalSettings {
                max_records_per_topic: Some(100_000),
            },
        }
    }
}

mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{ClientSettings, LocalSettings, Settings, StorageSettings};

/// Loads the configuration from `config/default` and `BOARLINK__*` environment variables.
///
/// Every field missing from both sources keeps its value from `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::with_prefix("BOARLINK").separator("__"));

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let client = partial.client.unwrap_or_default();
    let storage = partial.storage.unwrap_or_default();
    let local = partial.local.unwrap_or_default();

    Settings {
        client: ClientSettings {
            publish_timeout_secs: client
                .publish_timeout_secs
                .unwrap_or(default.client.publish_timeout_secs),
            admin_timeout_secs: client
                .admin_timeout_secs
                .unwrap_or(default.client.admin_timeout_secs),
            poll_interval_ms: client
                .poll_interval_ms
                .unwrap_or(default.client.poll_interval_ms),
            overview_cap: client.overview_cap.unwrap_or(default.client.overview_cap),
            overview_idle_timeout_ms: client
                .overview_idle_timeout_ms
                .unwrap_or(default.client.overview_idle_timeout_ms),
            consumer_group: client
                .consumer_group
                .unwrap_or(default.client.consumer_group),
        },
        storage: StorageSettings {
            profiles_path: storage
                .profiles_path
                .unwrap_or(default.storage.profiles_path),
            preferences_path: storage
                .preferences_path
                .unwrap_or(default.storage.preferences_path),
            log_dir: storage.log_dir.or(default.storage.log_dir),
        },
        local: LocalSettings {
            max_records_per_topic: local
                .max_records_per_topic
                .or(default.local.max_records_per_topic),
        },
    }
}

#[cfg(test)]
mod tests;

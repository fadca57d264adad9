use super::load_config;
use super::settings::Settings;
use serial_test::serial;
use std::env;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.client.publish_timeout(), Duration::from_secs(10));
    assert_eq!(settings.client.overview_cap, 10);
    assert_eq!(settings.client.poll_interval(), Duration::from_millis(100));
    assert_eq!(settings.client.consumer_group, "boarlink");
    assert_eq!(settings.storage.profiles_path, "servers.conf");
    assert_eq!(settings.storage.preferences_path, "settings.conf");
    assert!(settings.storage.log_dir.is_none());
}

#[test]
fn poll_interval_is_never_zero() {
    let mut settings = Settings::default();
    settings.client.poll_interval_ms = 0;
    assert_eq!(settings.client.poll_interval(), Duration::from_millis(1));
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // load_config reads config/default.toml relative to the current dir
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [client]
        publish_timeout_secs = 3
        overview_cap = 25

        [storage]
        log_dir = "logs"
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();

    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.client.publish_timeout_secs, 3);
    assert_eq!(cfg.client.overview_cap, 25);
    assert_eq!(cfg.client.poll_interval_ms, 100);
    assert_eq!(cfg.storage.log_dir.as_deref(), Some("logs"));
    assert_eq!(cfg.storage.profiles_path, "servers.conf");
}

#[test]
#[serial]
fn load_config_from_environment() {
    temp_env::with_vars(
        [
            ("BOARLINK__CLIENT__CONSUMER_GROUP", Some("ops-console")),
            ("BOARLINK__STORAGE__PROFILES_PATH", Some("/tmp/profiles.json")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.client.consumer_group, "ops-console");
            assert_eq!(cfg.storage.profiles_path, "/tmp/profiles.json");
            assert_eq!(cfg.client.overview_cap, 10);
        },
    );
}

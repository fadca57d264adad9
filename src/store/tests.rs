use super::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn missing_profile_file_yields_default_server() {
    let dir = tempdir().unwrap();
    let store = ProfileStore::load(dir.path().join("servers.conf")).unwrap();

    assert_eq!(store.names(), vec![DEFAULT_PROFILE_NAME.to_string()]);
    let profile = store.get(DEFAULT_PROFILE_NAME).unwrap();
    assert_eq!(profile.bootstrap_address, "localhost:9092");
    assert_eq!(profile.security_protocol, SecurityProtocol::Plaintext);
    assert!(profile.sasl_mechanism.is_none());
}

#[test]
fn profiles_survive_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("servers.conf");

    let mut store = ProfileStore::load(&path).unwrap();
    store
        .add(
            ConnectionProfile::new("prod", "broker-1:9093")
                .with_security(SecurityProtocol::SaslSsl)
                .with_sasl(
                    Some("SCRAM-SHA-256".into()),
                    Some("svc".into()),
                    Some("secret".into()),
                )
                .with_tls(Some("/etc/ca.pem".into()), None, None),
        )
        .unwrap();
    store.save().unwrap();

    let reloaded = ProfileStore::load(&path).unwrap();
    assert_eq!(reloaded.names(), vec!["Default Server", "prod"]);
    let prod = reloaded.get("prod").unwrap();
    assert_eq!(prod.name, "prod");
    assert_eq!(prod.security_protocol, SecurityProtocol::SaslSsl);
    assert_eq!(prod.sasl_username.as_deref(), Some("svc"));
    assert_eq!(prod.tls_ca_path.as_deref(), Some("/etc/ca.pem"));
}

#[test]
fn store_file_is_a_flat_name_keyed_object() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("servers.conf");
    let store = ProfileStore::load(&path).unwrap();
    store.save().unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let record = &raw["Default Server"];
    assert_eq!(record["bootstrap_address"], "localhost:9092");
    assert_eq!(record["security_protocol"], "PLAINTEXT");
    assert!(record.get("name").is_none());
}

#[test]
fn legacy_connector_keys_are_accepted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("servers.conf");
    fs::write(
        &path,
        r#"{
            "Legacy": {
                "bootstrap_servers": "old-host:9092",
                "security_protocol": "SSL",
                "sasl_mechanism": "",
                "sasl_username": "",
                "sasl_password": "",
                "ssl_cafile": "/ca.pem",
                "ssl_certfile": "",
                "ssl_keyfile": ""
            }
        }"#,
    )
    .unwrap();

    let store = ProfileStore::load(&path).unwrap();
    let legacy = store.get("Legacy").unwrap();
    assert_eq!(legacy.bootstrap_address, "old-host:9092");
    assert_eq!(legacy.security_protocol, SecurityProtocol::Ssl);
    assert_eq!(legacy.tls_ca_path.as_deref(), Some("/ca.pem"));
    // empty strings are kept as-is; normalization happens when connecting
    assert_eq!(legacy.sasl_mechanism.as_deref(), Some(""));
}

#[test]
fn malformed_profile_file_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("servers.conf");
    fs::write(&path, "{ not json").unwrap();

    let err = ProfileStore::load(&path).unwrap_err();
    assert!(matches!(err, crate::utils::error::StoreError::Json { .. }));
}

#[test]
fn add_rejects_duplicates_and_blank_names() {
    let dir = tempdir().unwrap();
    let mut store = ProfileStore::load(dir.path().join("s.conf")).unwrap();

    assert!(store.add(ConnectionProfile::new("  ", "x")).is_err());
    assert!(store.add(ConnectionProfile::new(DEFAULT_PROFILE_NAME, "x")).is_err());
    store.add(ConnectionProfile::new(" staging ", "x")).unwrap();
    assert!(store.get("staging").is_some());
}

#[test]
fn remove_drops_the_profile() {
    let dir = tempdir().unwrap();
    let mut store = ProfileStore::load(dir.path().join("s.conf")).unwrap();

    assert!(store.remove("missing").is_none());
    assert!(store.remove(DEFAULT_PROFILE_NAME).is_some());
    assert!(store.names().is_empty());
    assert!(store.first().is_none());
}

#[test]
fn security_protocol_parses_case_insensitively() {
    assert_eq!(
        "sasl_ssl".parse::<SecurityProtocol>().unwrap(),
        SecurityProtocol::SaslSsl
    );
    assert_eq!(
        "PLAINTEXT".parse::<SecurityProtocol>().unwrap(),
        SecurityProtocol::Plaintext
    );
    assert!("tls".parse::<SecurityProtocol>().is_err());
}

#[test]
fn preferences_default_and_persist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.conf");

    let mut store = PreferencesStore::load(&path).unwrap();
    assert_eq!(store.get(), &Preferences::default());
    assert!(store.logging_enabled());

    store.set_logging_enabled(false).unwrap();
    assert!(!store.logging_enabled());

    // only the flag changed on disk
    let reloaded = PreferencesStore::load(&path).unwrap();
    assert!(!reloaded.logging_enabled());
    assert_eq!(reloaded.get().theme, Theme::Light);
    assert_eq!(reloaded.get().font_family, "Segoe UI");
}

#[test]
fn partial_preferences_fill_in_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.conf");
    fs::write(&path, r#"{"logging_enabled": false}"#).unwrap();

    let store = PreferencesStore::load(&path).unwrap();
    assert!(!store.logging_enabled());
    assert_eq!(store.get().font_size, 12);
}

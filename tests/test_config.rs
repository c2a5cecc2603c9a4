// ABOUTME: Tests for loading and saving the TOML configuration file

use ide_session::config::{AppConfig, ConfigError};
use ide_session::session::SessionConfig;
use pretty_assertions::assert_eq;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(config, AppConfig::default());
    assert_eq!(config.editor.persist_debounce(), Duration::from_millis(2_000));
    assert_eq!(config.host.http_url, "http://localhost:8000");
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[host]
http_url = "http://devbox:9000"

[editor]
persist_debounce_ms = 500
"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    assert_eq!(config.host.http_url, "http://devbox:9000");
    assert_eq!(config.host.socket_url, "ws://localhost:8000/socket");
    assert_eq!(config.editor.persist_debounce_ms, 500);
    assert_eq!(config.channel.max_reconnect_attempts, 10);

    let session = SessionConfig::from(&config);
    assert_eq!(session.persist_debounce, Duration::from_millis(500));
    assert_eq!(session.request_timeout, Duration::from_secs(10));
}

#[test]
fn test_invalid_toml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[editor]\npersist_debounce_ms = \"soon\"\n").unwrap();

    let err = AppConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_saved_config_loads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut config = AppConfig::default();
    config.channel.ping_interval_ms = 5_000;
    config.host.socket_url = "wss://ide.example.com/socket".to_string();

    config.save_to(&path).unwrap();
    assert_eq!(AppConfig::load_from(&path).unwrap(), config);
}

use super::data::{Config, ConfigKey};
use super::io::ConfigError;
use crate::api::InvocationMode;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
    assert_eq!(config.timeout_ms(), 30_000);
    assert_eq!(config.mode(), InvocationMode::Proxy);
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config
        .set_value(ConfigKey::BackendUrl, "http://localhost:8080/api")
        .expect("set url");
    config
        .set_value(ConfigKey::DefaultMode, "server")
        .expect("set mode");
    config.save_to_path(&config_path).expect("save");

    let loaded = Config::load_from_path(&config_path).expect("load");
    assert_eq!(loaded.backend_url.as_deref(), Some("http://localhost:8080/api"));
    assert_eq!(loaded.mode(), InvocationMode::Server);

    let mut loaded = loaded;
    loaded.unset_value(ConfigKey::DefaultMode);
    loaded.save_to_path(&config_path).expect("save again");

    let reloaded = Config::load_from_path(&config_path).expect("reload");
    assert_eq!(reloaded.default_mode, None);
    assert_eq!(reloaded.backend_url, loaded.backend_url);
}

#[test]
fn test_invalid_toml_reports_parse_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "default_timeout_ms = \"soon\"").expect("write");

    let err = Config::load_from_path(&config_path).expect_err("should fail");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().starts_with("Failed to parse config at"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_set_value_rejects_bad_input() {
    let mut config = Config::default();

    assert!(config.set_value(ConfigKey::BackendUrl, "localhost").is_err());
    assert!(config.set_value(ConfigKey::DefaultTimeoutMs, "0").is_err());
    assert!(config.set_value(ConfigKey::DefaultTimeoutMs, "-5").is_err());
    assert!(config.set_value(ConfigKey::DefaultMode, "direct").is_err());
    assert_eq!(config, Config::default());

    config
        .set_value(ConfigKey::DefaultTimeoutMs, " 45000 ")
        .expect("valid timeout");
    assert_eq!(config.timeout_ms(), 45_000);
}

#[test]
fn test_config_key_parsing_accepts_both_spellings() {
    assert_eq!(ConfigKey::parse("backend-url"), Some(ConfigKey::BackendUrl));
    assert_eq!(
        ConfigKey::parse("REQUEST_TIMEOUT_SECS"),
        Some(ConfigKey::RequestTimeoutSecs)
    );
    assert_eq!(ConfigKey::parse("theme"), None);
}

#[test]
fn test_backend_url_precedence() {
    let config = Config {
        backend_url: Some("http://from-file".to_string()),
        ..Default::default()
    };

    assert_eq!(
        config.resolve_backend_url(Some("http://from-cli"), Some("http://from-env")),
        Some("http://from-cli".to_string())
    );
    assert_eq!(
        config.resolve_backend_url(Some("  "), Some("http://from-env")),
        Some("http://from-env".to_string())
    );
    assert_eq!(
        config.resolve_backend_url(None, None),
        Some("http://from-file".to_string())
    );
    assert_eq!(Config::default().resolve_backend_url(None, None), None);
}

#[test]
fn test_http_timeouts_fall_back_to_defaults() {
    let config = Config {
        connect_timeout_secs: Some(3),
        ..Default::default()
    };
    let timeouts = config.http_timeouts();
    assert_eq!(timeouts.connect, Duration::from_secs(3));
    assert_eq!(timeouts.request, Duration::from_secs(60));
}

#[test]
fn test_explicit_config_path_wins() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let explicit = temp_dir.path().join("custom.toml");
    assert_eq!(
        Config::resolve_path(Some(&explicit)).expect("explicit path"),
        explicit
    );
}

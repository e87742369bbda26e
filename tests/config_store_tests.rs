use std::time::Duration;

use tempfile::TempDir;

use selflayer_tui::utils::config::{
    ConfigStore, EnvOverrides, KeySource, SelflayerConfig, DEFAULT_BASE_URL,
};
use selflayer_tui::utils::error::ConfigError;

fn env(api_key: Option<&str>, base_url: Option<&str>) -> EnvOverrides {
    EnvOverrides {
        api_key: api_key.map(str::to_string),
        base_url: base_url.map(str::to_string),
    }
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::open(dir.path().join("config.json"), EnvOverrides::none());

    assert_eq!(store.config().base_url, DEFAULT_BASE_URL);
    assert!(store.config().created_at.is_some());
    assert!(store.effective_api_key().is_none());
    assert!(store.client_settings(Duration::from_secs(30)).is_none());
}

#[test]
fn test_update_api_key_persists_and_reloads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let mut store = ConfigStore::open(&path, EnvOverrides::none());

    store.update_api_key("  sl_live_persisted0001  ").unwrap();

    let reopened = ConfigStore::open(&path, EnvOverrides::none());
    assert_eq!(reopened.config().api_key.as_deref(), Some("sl_live_persisted0001"));
    assert!(reopened.config().updated_at.is_some());
    assert_eq!(
        reopened.effective_api_key(),
        Some(("sl_live_persisted0001".to_string(), KeySource::ConfigFile))
    );
}

#[test]
fn test_rejected_key_never_reaches_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let mut store = ConfigStore::open(&path, EnvOverrides::none());

    let result = store.update_api_key("pk_live_wrongprefix");

    assert!(matches!(result, Err(ConfigError::InvalidApiKey)));
    assert!(!path.exists());
    assert!(store.config().api_key.is_none());
}

#[test]
fn test_invalid_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = ConfigStore::open(&path, EnvOverrides::none());

    assert_eq!(store.config().base_url, DEFAULT_BASE_URL);
    assert!(store.config().api_key.is_none());
}

#[test]
fn test_legacy_key_field_is_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"gemini_api_key": "sl_test_legacy000001", "log_level": "debug"}"#).unwrap();

    let store = ConfigStore::open(&path, EnvOverrides::none());

    assert_eq!(store.config().api_key.as_deref(), Some("sl_test_legacy000001"));
    assert_eq!(store.config().log_level, "debug");
    assert!(store.config().created_at.is_some());
}

#[test]
fn test_environment_and_flag_precedence() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let mut stored = SelflayerConfig::new_stamped();
    stored.api_key = Some("sl_live_storedkey0001".to_string());
    stored.base_url = "https://stored.example.com/api/v1".to_string();
    std::fs::write(&path, serde_json::to_string(&stored).unwrap()).unwrap();

    let store = ConfigStore::open(&path, env(Some("sl_live_fromenv00001"), Some("https://env.example.com/api/v1")));
    assert_eq!(
        store.effective_api_key(),
        Some(("sl_live_fromenv00001".to_string(), KeySource::Environment))
    );
    assert_eq!(store.effective_base_url(), "https://env.example.com/api/v1");

    let store = store.with_base_url_flag(Some("http://localhost:8001/api/v1".to_string()));
    let settings = store.client_settings(Duration::from_secs(7)).unwrap();
    assert_eq!(settings.base_url, "http://localhost:8001/api/v1");
    assert_eq!(settings.api_key, "sl_live_fromenv00001");
    assert_eq!(settings.timeout, Duration::from_secs(7));
}

#[test]
fn test_clear_api_key_keeps_other_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let mut store = ConfigStore::open(&path, EnvOverrides::none());
    store.update_api_key("sl_live_toberemoved01").unwrap();
    let created = store.config().created_at.clone();

    store.clear_api_key().unwrap();

    let reopened = ConfigStore::open(&path, EnvOverrides::none());
    assert!(reopened.config().api_key.is_none());
    assert_eq!(reopened.config().created_at, created);
}

#[cfg(unix)]
#[test]
fn test_config_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let config_dir = dir.path().join(".selflayer");
    let path = config_dir.join("config.json");
    let mut store = ConfigStore::open(&path, EnvOverrides::none());
    store.update_api_key("sl_live_permissions01").unwrap();

    let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    let dir_mode = std::fs::metadata(&config_dir).unwrap().permissions().mode() & 0o777;
    assert_eq!(file_mode, 0o600);
    assert_eq!(dir_mode, 0o700);
}

#[test]
fn test_read_only_store_never_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let mut store = ConfigStore::open(&path, EnvOverrides::none()).read_only();

    assert!(store.is_read_only());
    assert!(matches!(store.update_api_key("sl_live_readonly00001"), Err(ConfigError::ReadOnly)));
    assert!(matches!(store.clear_api_key(), Err(ConfigError::ReadOnly)));
    assert!(!path.exists());
    assert!(store.config().api_key.is_none());
}

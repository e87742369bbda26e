use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::utils::error::ConfigError;

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.selflayer.com/api/v1";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "SELFLAYER_API_KEY";

/// Environment variable overriding the base URL
pub const BASE_URL_ENV: &str = "SELFLAYER_BASE_URL";

const CONFIG_DIR_NAME: &str = ".selflayer";
const CONFIG_FILE_NAME: &str = "config.json";
const API_KEY_PREFIXES: [&str; 2] = ["sl_live_", "sl_test_"];

/// Persistent client configuration stored as a flat JSON file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SelflayerConfig {
    #[serde(default, alias = "gemini_api_key")]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

impl Default for SelflayerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            log_level: default_log_level(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl SelflayerConfig {
    /// Fresh configuration stamped with the current time
    pub fn new_stamped() -> Self {
        Self {
            created_at: Some(now_timestamp()),
            ..Self::default()
        }
    }

    /// Check if a non-blank API key is stored
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().map(|key| !key.trim().is_empty()).unwrap_or(false)
    }

    /// Validate and store an API key
    pub fn set_api_key(&mut self, api_key: &str) -> Result<(), ConfigError> {
        self.api_key = Some(validate_api_key(api_key)?);
        Ok(())
    }

    /// Remove the stored API key
    pub fn clear_api_key(&mut self) {
        self.api_key = None;
    }
}

/// Check an API key against the SelfLayer prefix convention, returning it trimmed
pub fn validate_api_key(api_key: &str) -> Result<String, ConfigError> {
    let trimmed = api_key.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyApiKey);
    }
    if !API_KEY_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix)) {
        return Err(ConfigError::InvalidApiKey);
    }
    Ok(trimmed.to_string())
}

/// Mask a key as `first8...last4`
pub fn mask_api_key(api_key: Option<&str>) -> String {
    match api_key {
        None => "Not set".to_string(),
        Some(key) if key.is_empty() => "Not set".to_string(),
        Some(key) if key.chars().count() < 12 => "***".to_string(),
        Some(key) => {
            let chars: Vec<char> = key.chars().collect();
            let head: String = chars[..8].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}

/// Check that a base URL is an absolute http(s) URL
pub fn validate_base_url(base_url: &str) -> Result<String, ConfigError> {
    let trimmed = base_url.trim();
    let parsed = Url::parse(trimmed).map_err(|e| ConfigError::InvalidBaseUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.trim_end_matches('/').to_string()),
        other => Err(ConfigError::InvalidBaseUrl {
            url: trimmed.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Environment values captured once at startup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl EnvOverrides {
    /// Read overrides from the process environment; blank values are ignored
    pub fn from_env() -> Self {
        Self {
            api_key: env_opt(API_KEY_ENV),
            base_url: env_opt(BASE_URL_ENV),
        }
    }

    /// No overrides at all
    pub fn none() -> Self {
        Self::default()
    }
}

fn env_opt(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

/// Where the effective API key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    ConfigFile,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Environment => write!(f, "environment"),
            KeySource::ConfigFile => write!(f, "config"),
        }
    }
}

/// Settings a gateway is built from
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Loads and saves the config file, layering environment overrides on top
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: SelflayerConfig,
    env: EnvOverrides,
    base_url_flag: Option<String>,
    read_only: bool,
}

impl ConfigStore {
    /// Default per-user config path, `~/.selflayer/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Open the store at `path`, falling back to defaults when the file is missing or unreadable
    pub fn open(path: impl Into<PathBuf>, env: EnvOverrides) -> Self {
        let path = path.into();
        let config = load_config(&path);
        Self {
            path,
            config,
            env,
            base_url_flag: None,
            read_only: false,
        }
    }

    /// Refuse every write; the file on disk is never touched
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Apply a `--base-url` flag, which outranks every other source
    pub fn with_base_url_flag(mut self, base_url: Option<String>) -> Self {
        self.base_url_flag = base_url;
        self
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current in-memory configuration
    pub fn config(&self) -> &SelflayerConfig {
        &self.config
    }

    /// Effective API key: environment first, then the stored key
    pub fn effective_api_key(&self) -> Option<(String, KeySource)> {
        if let Some(key) = &self.env.api_key {
            return Some((key.clone(), KeySource::Environment));
        }
        self.config
            .api_key
            .as_ref()
            .filter(|key| !key.trim().is_empty())
            .map(|key| (key.trim().to_string(), KeySource::ConfigFile))
    }

    /// Effective base URL: flag, then environment, then the stored value
    pub fn effective_base_url(&self) -> String {
        self.base_url_flag
            .clone()
            .or_else(|| self.env.base_url.clone())
            .unwrap_or_else(|| self.config.base_url.clone())
    }

    /// Gateway settings, or `None` when no key is available
    pub fn client_settings(&self, timeout: Duration) -> Option<ClientSettings> {
        self.effective_api_key().map(|(api_key, _)| ClientSettings {
            api_key,
            base_url: self.effective_base_url(),
            timeout,
        })
    }

    /// Validate, store and persist a new API key. A rejected key never reaches disk.
    pub fn update_api_key(&mut self, api_key: &str) -> Result<(), ConfigError> {
        let mut next = self.config.clone();
        next.set_api_key(api_key)?;
        self.save_config(next)
    }

    /// Remove the stored key and persist
    pub fn clear_api_key(&mut self) -> Result<(), ConfigError> {
        let mut next = self.config.clone();
        next.clear_api_key();
        self.save_config(next)
    }

    /// Overwrite the whole file with `config`, stamping `updated_at`
    pub fn save_config(&mut self, mut config: SelflayerConfig) -> Result<(), ConfigError> {
        if self.read_only {
            return Err(ConfigError::ReadOnly);
        }
        if config.created_at.is_none() {
            config.created_at = Some(now_timestamp());
        }
        config.updated_at = Some(now_timestamp());

        ensure_config_dir(&self.path)?;
        let body = serde_json::to_string_pretty(&config)?;
        write_owner_only(&self.path, body.as_bytes())?;

        info!(path = %self.path.display(), "configuration saved");
        self.config = config;
        Ok(())
    }
}

fn load_config(path: &Path) -> SelflayerConfig {
    if !path.exists() {
        info!(path = %path.display(), "no existing config found, using defaults");
        return SelflayerConfig::new_stamped();
    }

    let parsed = fs::read_to_string(path)
        .map_err(ConfigError::from)
        .and_then(|raw| serde_json::from_str::<SelflayerConfig>(&raw).map_err(ConfigError::from));

    match parsed {
        Ok(mut config) => {
            if config.created_at.is_none() {
                config.created_at = Some(now_timestamp());
            }
            debug!(path = %path.display(), "configuration loaded");
            config
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            SelflayerConfig::new_stamped()
        }
    }
}

fn ensure_config_dir(path: &Path) -> Result<(), ConfigError> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

fn write_owner_only(path: &Path, body: &[u8]) -> Result<(), ConfigError> {
    fs::write(path, body)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SelflayerConfig::default();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.log_level, "warn");
        assert!(config.api_key.is_none());
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_validate_api_key_prefixes() {
        assert_eq!(validate_api_key("  sl_live_abc123  ").unwrap(), "sl_live_abc123");
        assert_eq!(validate_api_key("sl_test_abc123").unwrap(), "sl_test_abc123");
        assert!(matches!(validate_api_key("sk_live_abc"), Err(ConfigError::InvalidApiKey)));
        assert!(matches!(validate_api_key("   "), Err(ConfigError::EmptyApiKey)));
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key(None), "Not set");
        assert_eq!(mask_api_key(Some("sl_live_1")), "***");
        assert_eq!(mask_api_key(Some("sl_live_abcdefgh1234")), "sl_live_...1234");
    }

    #[test]
    fn test_legacy_key_alias() {
        let raw = r#"{"gemini_api_key": "sl_live_legacykey0001"}"#;
        let config: SelflayerConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sl_live_legacykey0001"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_validate_base_url() {
        assert_eq!(
            validate_base_url("http://localhost:8001/api/v1/").unwrap(),
            "http://localhost:8001/api/v1"
        );
        assert!(validate_base_url("ftp://example.com").is_err());
        assert!(validate_base_url("not a url").is_err());
    }

    #[test]
    fn test_key_source_display() {
        assert_eq!(KeySource::Environment.to_string(), "environment");
        assert_eq!(KeySource::ConfigFile.to_string(), "config");
    }
}

//! Client configuration, read from the environment.
//!
//! The binary loads `.env` with `dotenvy` before calling
//! [`ClientConfig::from_env`], so the same variables work from either place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::session::storage::{
    FileStore, KeyValueStore, KeyringStore, MemoryStore, KEYCHAIN_AVAILABLE,
};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_LOGIN_VIEW: &str = "/admin/login";
pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid API base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("Invalid value for {var}: {value:?}")]
    InvalidVar { var: &'static str, value: String },
    #[error("Could not determine a location for the session file")]
    NoSessionPath,
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Where the credential is persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    File(PathBuf),
    Keyring,
    Memory,
}

impl StorageBackend {
    /// Open the configured substrate.
    pub fn open(&self) -> Arc<dyn KeyValueStore> {
        match self {
            StorageBackend::File(path) => Arc::new(FileStore::new(path)),
            StorageBackend::Keyring => Arc::new(KeyringStore::default()),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL; request paths are appended to it.
    pub api_base_url: String,
    /// View the application shows for signing in to the admin area.
    pub login_view: String,
    /// Delay before a login redirect is published.
    pub redirect_delay: Duration,
    /// A protected 401 within this long after login leaves the credential alone.
    pub grace_window: Duration,
    /// Whole-request timeout. `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub storage: StorageBackend,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            login_view: DEFAULT_LOGIN_VIEW.to_string(),
            redirect_delay: DEFAULT_REDIRECT_DELAY,
            grace_window: DEFAULT_GRACE_WINDOW,
            request_timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            storage: StorageBackend::Memory,
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at a specific backend.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Read configuration from environment variables.
    ///
    /// API URL: STOREFRONT_API_URL > API_URL > localhost default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("STOREFRONT_API_URL")
            .or_else(|| lookup("API_URL"))
            .unwrap_or(defaults.api_base_url);
        let login_view = lookup("STOREFRONT_LOGIN_VIEW").unwrap_or(defaults.login_view);

        let redirect_delay = parse_var(&lookup, "STOREFRONT_REDIRECT_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.redirect_delay);
        let grace_window = parse_var(&lookup, "STOREFRONT_GRACE_WINDOW_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.grace_window);
        let request_timeout =
            parse_var(&lookup, "STOREFRONT_TIMEOUT_SECS")?.map(Duration::from_secs);

        let storage = match lookup("STOREFRONT_STORAGE").as_deref() {
            None | Some("file") => {
                let path = lookup("STOREFRONT_SESSION_FILE")
                    .map(PathBuf::from)
                    .or_else(FileStore::default_path)
                    .ok_or(ConfigError::NoSessionPath)?;
                StorageBackend::File(path)
            }
            Some("keyring") if KEYCHAIN_AVAILABLE => StorageBackend::Keyring,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidVar {
                    var: "STOREFRONT_STORAGE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            api_base_url,
            login_view,
            redirect_delay,
            grace_window,
            request_timeout,
            connect_timeout: defaults.connect_timeout,
            storage,
        })
    }
}

fn parse_var<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("STOREFRONT_STORAGE", "memory")]).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.login_view, "/admin/login");
        assert_eq!(config.grace_window, Duration::from_secs(5));
        assert!(config.request_timeout.is_none());
        assert_eq!(config.storage, StorageBackend::Memory);
    }

    #[test]
    fn test_api_url_precedence() {
        let config = config_from(&[
            ("STOREFRONT_API_URL", "https://shop.example/api"),
            ("API_URL", "https://other.example"),
        ])
        .unwrap();
        assert_eq!(config.api_base_url, "https://shop.example/api");

        let fallback = config_from(&[("API_URL", "https://other.example")]).unwrap();
        assert_eq!(fallback.api_base_url, "https://other.example");
    }

    #[test]
    fn test_durations_and_storage() {
        let config = config_from(&[
            ("STOREFRONT_REDIRECT_DELAY_MS", "250"),
            ("STOREFRONT_GRACE_WINDOW_MS", "0"),
            ("STOREFRONT_TIMEOUT_SECS", "30"),
            ("STOREFRONT_STORAGE", "file"),
            ("STOREFRONT_SESSION_FILE", "/tmp/session.json"),
        ])
        .unwrap();
        assert_eq!(config.redirect_delay, Duration::from_millis(250));
        assert_eq!(config.grace_window, Duration::ZERO);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            config.storage,
            StorageBackend::File(PathBuf::from("/tmp/session.json"))
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("STOREFRONT_GRACE_WINDOW_MS", "soon")]),
            Err(ConfigError::InvalidVar { var: "STOREFRONT_GRACE_WINDOW_MS", .. })
        ));
        assert!(matches!(
            config_from(&[("STOREFRONT_STORAGE", "cookie")]),
            Err(ConfigError::InvalidVar { var: "STOREFRONT_STORAGE", .. })
        ));
    }

    #[test]
    fn test_keyring_only_where_a_keychain_exists() {
        let result = config_from(&[("STOREFRONT_STORAGE", "keyring")]);
        if KEYCHAIN_AVAILABLE {
            assert_eq!(result.unwrap().storage, StorageBackend::Keyring);
        } else {
            assert!(matches!(
                result,
                Err(ConfigError::InvalidVar { var: "STOREFRONT_STORAGE", .. })
            ));
        }
    }
}

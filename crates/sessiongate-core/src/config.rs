//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, endpoint paths, the storage backend and the last used
//! username.
//!
//! Configuration is stored at `~/.config/sessiongate/config.json`.
//! `SESSIONGATE_API_URL` and `SESSIONGATE_STORAGE` override the file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, SessionStore, Storage, StorageOptions};

/// Application name used for config/data directory paths
const APP_NAME: &str = "sessiongate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "SESSIONGATE_API_URL";

/// Environment variable overriding `storage`
pub const STORAGE_ENV: &str = "SESSIONGATE_STORAGE";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Paths of the auth endpoints, relative to the API base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub login: String,
    pub registration: String,
    pub refresh: String,
    pub logout: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "users/login/".to_string(),
            registration: "users/registration/".to_string(),
            refresh: "users/token/refresh/".to_string(),
            logout: "users/logout/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
    Keyring,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "keyring" => Ok(StorageBackend::Keyring),
            other => Err(anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Scheme placed before the token in the Authorization header
    pub auth_scheme: String,
    pub request_timeout_secs: u64,
    pub token_ttl_days: i64,
    pub storage: StorageBackend,
    /// Where the route guard sends unauthenticated navigation
    pub login_path: String,
    pub endpoints: Endpoints,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/".to_string(),
            auth_scheme: "Bearer".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_ttl_days: 1,
            storage: StorageBackend::default(),
            login_path: "/login".to_string(),
            endpoints: Endpoints::default(),
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        debug!(base_url = %config.api_base_url, storage = ?config.storage, "Config loaded");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides looked up by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(storage) = lookup(STORAGE_ENV).filter(|v| !v.trim().is_empty()) {
            self.storage = storage.parse()?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding persisted session material
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("logs"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn storage_options(&self) -> StorageOptions {
        StorageOptions::secure_for(chrono::Duration::days(self.token_ttl_days))
    }

    pub fn build_storage(&self) -> Result<Arc<dyn Storage>> {
        let storage: Arc<dyn Storage> = match self.storage {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::File => Arc::new(FileStorage::new(self.data_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
        };
        Ok(storage)
    }

    /// Session store over the configured backend, restored from storage
    pub fn open_session(&self) -> Result<SessionStore> {
        let session =
            SessionStore::new(self.build_storage()?).with_options(self.storage_options());
        if let Err(e) = session.restore() {
            warn!(error = %e, "Failed to restore session, starting logged out");
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_backend_routes() {
        let config = Config::default();
        assert_eq!(config.endpoints.login, "users/login/");
        assert_eq!(config.endpoints.registration, "users/registration/");
        assert_eq!(config.endpoints.refresh, "users/token/refresh/");
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.storage, StorageBackend::File);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let json = r#"{"api_base_url": "https://api.example.com/", "storage": "keyring"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com/");
        assert_eq!(config.storage, StorageBackend::Keyring);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.endpoints, Endpoints::default());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(|key| match key {
                API_URL_ENV => Some("http://staging:9000/".to_string()),
                STORAGE_ENV => Some("Memory".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.api_base_url, "http://staging:9000/");
        assert_eq!(config.storage, StorageBackend::Memory);
    }

    #[test]
    fn test_unknown_storage_override_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == STORAGE_ENV).then(|| "floppy".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_session_opens_empty() {
        let config = Config {
            storage: StorageBackend::Memory,
            ..Config::default()
        };
        let session = config.open_session().unwrap();
        assert!(!session.is_authenticated());
    }
}

//! Durable storage adapters for session tokens.
//!
//! The session store talks to a single `Storage` implementation chosen at
//! start-up: in-memory, a JSON file acting as a cookie jar, or the OS keychain.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Storage file name in the data directory
const STORAGE_FILE: &str = "session.json";

/// Extension of the file written before it replaces `STORAGE_FILE`
const STAGING_EXTENSION: &str = "json.tmp";

/// Per-key write options, modelled on cookie attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageOptions {
    pub secure: bool,
    pub expires_in: Option<Duration>,
}

impl StorageOptions {
    pub fn secure_for(expires_in: Duration) -> Self {
        Self {
            secure: true,
            expires_in: Some(expires_in),
        }
    }
}

/// Key/value store for session material.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str, options: &StorageOptions) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn new(value: &str, options: &StorageOptions) -> Self {
        Self {
            value: value.to_string(),
            expires_at: options.expires_in.map(|ttl| Utc::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Utc::now() > at).unwrap_or(false)
    }
}

/// Process-local storage; forgotten on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        match entries.get(key) {
            Some(stored) if stored.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, options: &StorageOptions) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        entries.insert(key.to_string(), StoredValue::new(value, options));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// JSON file in the data directory; the durable "cookie jar".
pub struct FileStorage {
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            lock: Mutex::new(()),
        }
    }

    fn storage_path(&self) -> PathBuf {
        self.data_dir.join(STORAGE_FILE)
    }

    fn load(&self) -> Result<HashMap<String, StoredValue>> {
        let path = self.storage_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents =
            std::fs::read_to_string(&path).context("Failed to read session storage file")?;
        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // Damaged file reads as empty and is overwritten by the next save
                warn!(path = %path.display(), error = %e, "Discarding unreadable session storage file");
                Ok(HashMap::new())
            }
        }
    }

    fn save(&self, entries: &HashMap<String, StoredValue>) -> Result<()> {
        let path = self.storage_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        let staging = path.with_extension(STAGING_EXTENSION);
        std::fs::write(&staging, contents).context("Failed to write session storage file")?;
        std::fs::rename(&staging, &path).context("Failed to replace session storage file")?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("file storage lock poisoned"))?;
        let entries = self.load()?;
        match entries.get(key) {
            Some(stored) if stored.is_expired() => {
                debug!(key, "Stored value expired");
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, options: &StorageOptions) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("file storage lock poisoned"))?;
        let mut entries = self.load()?;
        entries.insert(key.to_string(), StoredValue::new(value, options));
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("file storage lock poisoned"))?;
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::storage::{MemoryStorage, Storage, StorageOptions};
use crate::models::{CredentialPair, User};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key for the serialized user record
pub const USER_KEY: &str = "user";

/// Default lifetime of persisted tokens, in days.
/// Matches the one-day cookies the web client set.
const DEFAULT_TOKEN_TTL_DAYS: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub credentials: CredentialPair,
    pub user: Option<User>,
    pub established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(credentials: CredentialPair, user: Option<User>) -> Self {
        Self {
            credentials,
            user,
            established_at: Utc::now(),
        }
    }
}

/// Single authoritative holder of the current credentials.
///
/// Clone is cheap and every clone observes the same session. Each write
/// swaps the whole session under one lock, so readers never see a pair
/// from one login next to the user of another.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<Option<Session>>>,
    storage: Arc<dyn Storage>,
    options: StorageOptions,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            state: Arc::new(RwLock::new(None)),
            storage,
            options: StorageOptions::secure_for(Duration::days(DEFAULT_TOKEN_TTL_DAYS)),
        }
    }

    /// Store with no durable backing
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Override how tokens are written to storage
    pub fn with_options(mut self, options: StorageOptions) -> Self {
        self.options = options;
        self
    }

    /// Load a previously persisted session from storage.
    ///
    /// Returns `Ok(true)` if a complete pair was found. A half-present pair
    /// is treated as corrupt and wiped.
    pub fn restore(&self) -> Result<bool> {
        let access = self.storage.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.storage.get(REFRESH_TOKEN_KEY)?;

        let pair = match (access, refresh) {
            (Some(access), Some(refresh)) => CredentialPair::new(access, refresh).ok(),
            (None, None) => return Ok(false),
            _ => None,
        };

        let Some(pair) = pair else {
            warn!("Stored session is missing a token, discarding it");
            self.clear();
            return Ok(false);
        };

        let user = match self.storage.get(USER_KEY)? {
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Failed to parse stored user");
                    None
                }
            },
            None => None,
        };

        *self.write() = Some(Session::new(pair, user));
        debug!("Session restored from storage");
        Ok(true)
    }

    /// Replace credentials and user in one step.
    ///
    /// Storage is written while the write lock is held, so concurrent
    /// writers cannot interleave their keys in storage.
    pub fn set_credentials(&self, pair: CredentialPair, user: Option<User>) {
        let mut state = self.write();
        let session = Session::new(pair, user);
        self.persist(&session);
        *state = Some(session);
    }

    /// Swap in a refreshed pair, keeping the current user
    pub fn replace_credentials(&self, pair: CredentialPair) {
        let mut state = self.write();
        let user = state.as_ref().and_then(|s| s.user.clone());
        let session = Session::new(pair, user);
        self.persist(&session);
        *state = Some(session);
    }

    /// Drop the session and wipe it from storage
    pub fn clear(&self) {
        let mut state = self.write();
        let had_session = state.take().is_some();
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove stored session value");
            }
        }
        if had_session {
            info!("Session cleared");
        }
    }

    /// Current access token, if logged in
    pub fn get_token(&self) -> Option<String> {
        self.read()
            .as_ref()
            .map(|s| s.credentials.access_token().to_string())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read()
            .as_ref()
            .map(|s| s.credentials.refresh_token().to_string())
    }

    pub fn user(&self) -> Option<User> {
        self.read().as_ref().and_then(|s| s.user.clone())
    }

    pub fn snapshot(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.write_storage(session) {
            warn!(error = %e, "Failed to persist session");
        }
    }

    fn write_storage(&self, session: &Session) -> Result<()> {
        let pair = &session.credentials;
        self.storage
            .set(ACCESS_TOKEN_KEY, pair.access_token(), &self.options)?;
        self.storage
            .set(REFRESH_TOKEN_KEY, pair.refresh_token(), &self.options)?;
        match &session.user {
            Some(user) => {
                let raw = serde_json::to_string(user)?;
                self.storage.set(USER_KEY, &raw, &self.options)?;
            }
            None => self.storage.remove(USER_KEY)?,
        }
        Ok(())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FileStorage;

    fn pair(access: &str, refresh: &str) -> CredentialPair {
        CredentialPair::new(access, refresh).unwrap()
    }

    struct FailingStorage;

    impl Storage for FailingStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow::anyhow!("unavailable"))
        }
        fn set(&self, _key: &str, _value: &str, _options: &StorageOptions) -> Result<()> {
            Err(anyhow::anyhow!("unavailable"))
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Err(anyhow::anyhow!("unavailable"))
        }
    }

    #[test]
    fn test_empty_at_start() {
        let store = SessionStore::in_memory();
        assert!(!store.is_authenticated());
        assert_eq!(store.get_token(), None);
        assert_eq!(store.user(), None);
    }

    #[test]
    fn test_set_and_clear() {
        let store = SessionStore::in_memory();
        store.set_credentials(pair("a-1", "r-1"), Some(User::from_username("alice")));

        assert_eq!(store.get_token().as_deref(), Some("a-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("r-1"));
        assert_eq!(store.user().map(|u| u.username), Some("alice".to_string()));

        store.clear();
        assert_eq!(store.get_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_replace_keeps_user() {
        let store = SessionStore::in_memory();
        store.set_credentials(pair("a-1", "r-1"), Some(User::from_username("alice")));
        store.replace_credentials(pair("a-2", "r-2"));

        let session = store.snapshot().unwrap();
        assert_eq!(session.credentials, pair("a-2", "r-2"));
        assert_eq!(session.user, Some(User::from_username("alice")));
    }

    #[test]
    fn test_clones_share_state() {
        let store = SessionStore::in_memory();
        let other = store.clone();
        store.set_credentials(pair("a-1", "r-1"), None);
        assert_eq!(other.get_token().as_deref(), Some("a-1"));
    }

    #[test]
    fn test_restore_round_trips_through_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store.set_credentials(pair("a-1", "r-1"), Some(User::from_username("alice")));

        let restored = SessionStore::new(storage);
        assert!(restored.restore().unwrap());
        assert_eq!(restored.get_token().as_deref(), Some("a-1"));
        assert_eq!(restored.user().unwrap().username, "alice");
    }

    #[test]
    fn test_restore_discards_half_pair() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage
            .set(ACCESS_TOKEN_KEY, "a-1", &StorageOptions::default())
            .unwrap();

        let store = SessionStore::new(storage.clone());
        assert!(!store.restore().unwrap());
        assert!(!store.is_authenticated());
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_restore_from_damaged_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("session.json"), r#"{"accessToken": {"va"#).unwrap();

        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path().to_path_buf()));
        let store = SessionStore::new(storage.clone());
        assert!(!store.restore().unwrap());

        store.set_credentials(pair("a-1", "r-1"), None);
        let reopened = SessionStore::new(storage);
        assert!(reopened.restore().unwrap());
        assert_eq!(reopened.get_token().as_deref(), Some("a-1"));
    }

    #[test]
    fn test_concurrent_writers_leave_a_matching_pair_in_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let tag = format!("{}-{}", i, round);
                        let next = pair(&format!("a-{}", tag), &format!("r-{}", tag));
                        if i % 2 == 0 {
                            store.set_credentials(next, None);
                        } else {
                            store.replace_credentials(next);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let access = storage.get(ACCESS_TOKEN_KEY).unwrap().unwrap();
        let refresh = storage.get(REFRESH_TOKEN_KEY).unwrap().unwrap();
        assert_eq!(access.trim_start_matches("a-"), refresh.trim_start_matches("r-"));
        assert_eq!(store.get_token(), Some(access));
    }

    #[test]
    fn test_storage_failure_does_not_block_memory_update() {
        let store = SessionStore::new(Arc::new(FailingStorage));
        store.set_credentials(pair("a-1", "r-1"), None);
        assert_eq!(store.get_token().as_deref(), Some("a-1"));

        store.clear();
        assert!(!store.is_authenticated());
        assert!(store.restore().is_err());
    }
}

//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionStore`: the authoritative holder of the current token pair
//! - `Storage`: the durable storage adapter the store writes through to
//! - `KeyringStorage`: secure OS-level storage via keyring
//!
//! Tokens are persisted under the `accessToken` and `refreshToken` keys.

pub mod credentials;
pub mod session;
pub mod storage;

pub use credentials::KeyringStorage;
pub use session::{Session, SessionStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageOptions};

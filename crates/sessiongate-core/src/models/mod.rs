//! Data models for sessions and the auth endpoints.
//!
//! This module contains:
//! - `CredentialPair`: the access/refresh token tuple issued together
//! - `User`: the identity record attached to a session
//! - Request and response payloads for login, signup, refresh and logout

pub mod credentials;
pub mod user;

pub use credentials::{CredentialError, CredentialPair, RefreshRequest, TokenResponse};
pub use user::{LoginRequest, LogoutRequest, SignupRequest, User};

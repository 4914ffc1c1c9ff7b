//! sessiongate core library.
//!
//! Client-side session handling for a token-authenticated HTTP API:
//! - `auth`: the session store and its durable storage adapters
//! - `api`: login/signup/logout and the request wrapper that refreshes tokens
//! - `guard`: the route guard for protected views
//! - `config`: endpoint paths, storage backend and other settings

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, ApiRequest, ApiResponse, AuthClient, AuthOutcome, ErrorKind};
pub use auth::{SessionStore, Storage};
pub use config::Config;
pub use guard::{GuardDecision, Navigator, RedirectState, RouteGuard};
pub use models::{CredentialPair, User};

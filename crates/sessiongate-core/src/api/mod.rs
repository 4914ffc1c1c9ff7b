//! REST API client module for the auth backend.
//!
//! This module provides the `AuthClient` for communicating with the API:
//! login and signup, authenticated requests with transparent token refresh,
//! and logout.
//!
//! Requests carry the access token in the Authorization header. A 401
//! response is answered with one refresh through the token refresh endpoint.

pub mod auth;
pub mod client;
pub mod error;
pub mod transport;

pub use auth::AuthOutcome;
pub use client::{AuthClient, NEEDS_REFRESH_STATUS};
pub use error::{ApiError, ErrorKind};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};

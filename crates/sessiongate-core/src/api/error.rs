use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("No response from server: {0}")]
    NetworkUnreachable(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Request failed with status {status}: {message}")]
    Other { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request cancelled")]
    Cancelled,
}

/// Coarse failure classes shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum ErrorKind {
    NetworkUnreachable,
    BadRequest,
    Unauthorized,
    Forbidden,
    Other,
}

impl ErrorKind {
    /// Message displayed next to the login and signup forms
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::NetworkUnreachable => "No Server Response!",
            ErrorKind::BadRequest => "Missing Username or Password!",
            ErrorKind::Unauthorized => "Unauthorized!",
            ErrorKind::Forbidden => "Forbidden!",
            ErrorKind::Other => "Login Failed!",
        }
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Prefer the server's `error`/`detail` field over the raw body
    fn message_from_body(body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            if let Some(message) = parsed.error.or(parsed.detail) {
                return Self::truncate_body(&message);
            }
        }
        Self::truncate_body(body)
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let message = Self::message_from_body(body);
        match status {
            400 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(message),
            _ => ApiError::Other { status, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::NetworkUnreachable(_) => ErrorKind::NetworkUnreachable,
            ApiError::BadRequest(_) => ErrorKind::BadRequest,
            ApiError::Unauthorized => ErrorKind::Unauthorized,
            ApiError::Forbidden(_) => ErrorKind::Forbidden,
            ApiError::Other { .. }
            | ApiError::InvalidResponse(_)
            | ApiError::InvalidRequest(_)
            | ApiError::Cancelled => ErrorKind::Other,
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::NetworkUnreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidResponse(err.to_string())
    }
}

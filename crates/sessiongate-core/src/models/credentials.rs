use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::User;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Access token is empty")]
    EmptyAccessToken,

    #[error("Refresh token is empty")]
    EmptyRefreshToken,
}

/// Access and refresh token issued together.
///
/// Both tokens are opaque; nothing is decoded client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    access_token: String,
    refresh_token: String,
}

impl CredentialPair {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        if access_token.trim().is_empty() {
            return Err(CredentialError::EmptyAccessToken);
        }
        if refresh_token.trim().is_empty() {
            return Err(CredentialError::EmptyRefreshToken);
        }
        Ok(Self {
            access_token,
            refresh_token,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

/// Token payload returned by login, signup and refresh.
///
/// Accepts both the camelCase names and the short `access`/`refresh`
/// names the backend emits.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(rename = "accessToken", alias = "access")]
    pub access_token: String,
    #[serde(rename = "refreshToken", alias = "refresh", default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl TokenResponse {
    /// Build the pair, falling back to `current_refresh` when the
    /// server did not rotate the refresh token.
    pub fn into_pair(
        self,
        current_refresh: Option<&str>,
    ) -> Result<(CredentialPair, Option<User>), CredentialError> {
        let refresh = match self.refresh_token {
            Some(token) if !token.trim().is_empty() => token,
            _ => current_refresh.unwrap_or_default().to_string(),
        };
        let pair = CredentialPair::new(self.access_token, refresh)?;
        Ok((pair, self.user))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

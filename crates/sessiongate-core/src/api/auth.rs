//! Login, signup and logout.
//!
//! Successful login or signup populates the session store. Failures of any
//! kind leave it exactly as it was.

use serde::Serialize;
use tracing::{info, warn};

use super::client::AuthClient;
use super::transport::ApiRequest;
use super::ApiError;
use crate::models::{CredentialPair, LoginRequest, SignupRequest, TokenResponse, User};

/// Result of a successful login or signup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub credentials: CredentialPair,
    pub user: User,
}

impl AuthClient {
    /// Exchange username and password for a token pair
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthOutcome, ApiError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ApiError::BadRequest(
                "Username and password required".to_string(),
            ));
        }

        let request = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        let outcome = self
            .exchange(&self.endpoints().login, &request, || {
                User::from_username(request.username.clone())
            })
            .await?;

        info!(username = %outcome.user.username, "Login successful");
        Ok(outcome)
    }

    /// Register a new account and start a session for it
    pub async fn signup(
        &self,
        name: &str,
        last_name: &str,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthOutcome, ApiError> {
        let request = SignupRequest {
            name: name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        if let Some(field) = request.missing_field() {
            return Err(ApiError::BadRequest(format!("Missing required field: {}", field)));
        }

        let outcome = self
            .exchange(&self.endpoints().registration, &request, || request.to_user())
            .await?;

        info!(username = %outcome.user.username, "Signup successful");
        Ok(outcome)
    }

    /// End the session on the server and locally.
    ///
    /// The local session is cleared even when the server call fails; the
    /// server's error is still returned.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = match self.session().refresh_token() {
            Some(refresh_token) => self.revoke(&refresh_token).await,
            None => Ok(()),
        };
        if let Err(ref e) = result {
            warn!(error = %e, "Server rejected logout");
        }
        self.session().clear();
        info!("Logged out");
        result
    }

    /// Post credentials and store the returned pair
    async fn exchange<B, F>(&self, path: &str, body: &B, fallback_user: F) -> Result<AuthOutcome, ApiError>
    where
        B: Serialize,
        F: FnOnce() -> User,
    {
        let body = serde_json::to_value(body)?;
        let response = self
            .transport()
            .execute(&ApiRequest::post(path, body))
            .await?
            .error_for_status()?;

        let tokens: TokenResponse = response.json()?;
        let (credentials, user) = tokens
            .into_pair(None)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let user = user.unwrap_or_else(fallback_user);

        self.session()
            .set_credentials(credentials.clone(), Some(user.clone()));
        Ok(AuthOutcome { credentials, user })
    }
}

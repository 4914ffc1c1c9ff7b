//! Authenticated request wrapper.
//!
//! `AuthClient` attaches the session's access token to every request. When
//! the server rejects it, the client trades the refresh token for a new pair
//! and replays the request once. Concurrent requests rejected with the same
//! token share a single refresh.

use std::sync::Arc;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
use super::ApiError;
use crate::auth::SessionStore;
use crate::config::{Config, Endpoints};
use crate::models::{LogoutRequest, RefreshRequest, TokenResponse};

/// Status that means the access token is invalid or expired.
/// 403 is a permission failure and is passed to the caller untouched.
pub const NEEDS_REFRESH_STATUS: u16 = 401;

/// API client that keeps the session's tokens fresh.
/// Clone is cheap - clones share the transport, session and refresh gate.
#[derive(Clone)]
pub struct AuthClient {
    transport: Arc<dyn Transport>,
    session: SessionStore,
    endpoints: Endpoints,
    refresh_gate: Arc<Mutex<()>>,
}

impl AuthClient {
    pub fn new(transport: Arc<dyn Transport>, session: SessionStore, endpoints: Endpoints) -> Self {
        Self {
            transport,
            session,
            endpoints,
            refresh_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Build a reqwest-backed client from configuration
    pub fn from_config(config: &Config, session: SessionStore) -> Result<Self> {
        let transport = ReqwestTransport::new(
            &config.api_base_url,
            config.request_timeout(),
            config.auth_scheme.clone(),
        )?;
        Ok(Self::new(
            Arc::new(transport),
            session,
            config.endpoints.clone(),
        ))
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Send a request with the current access token.
    ///
    /// A 401 triggers at most one refresh and one replay. If the refresh
    /// fails the session is cleared and `ApiError::Unauthorized` is returned.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let presented = self.session.get_token();
        let response = self
            .transport
            .execute(&request.with_bearer(presented.clone()))
            .await?;

        if response.status != NEEDS_REFRESH_STATUS {
            return response.error_for_status();
        }

        debug!(path = %request.path, "Access token rejected");
        let Some(token) = self.refresh_after_rejection(presented.as_deref()).await else {
            return Err(ApiError::Unauthorized);
        };

        debug!(path = %request.path, "Replaying request with refreshed token");
        self.transport
            .execute(&request.with_bearer(Some(token)))
            .await?
            .error_for_status()
    }

    /// Like `send`, but gives up with `ApiError::Cancelled` once `cancel` fires.
    /// A cancelled call makes no further changes to the session.
    pub async fn send_cancellable(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(path = %request.path, "Request cancelled");
                Err(ApiError::Cancelled)
            }
            result = self.send(request.clone()) => result,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        self.send(ApiRequest::post(path, body)).await?.json()
    }

    /// Obtain a usable access token after `rejected` was refused.
    ///
    /// Callers queue on the refresh gate. Whoever gets it first refreshes;
    /// the rest find a different token in the session and reuse it.
    async fn refresh_after_rejection(&self, rejected: Option<&str>) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.session.get_token();
        if current.is_some() && current.as_deref() != rejected {
            debug!("Token already refreshed by a concurrent request");
            return current;
        }

        match self.refresh().await {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.end_session().await;
                None
            }
        }
    }

    /// Exchange the refresh token for a new pair and store it
    async fn refresh(&self) -> Result<String, ApiError> {
        let refresh_token = self
            .session
            .refresh_token()
            .ok_or(ApiError::Unauthorized)?;

        let body = serde_json::to_value(RefreshRequest {
            refresh: &refresh_token,
        })?;
        let response = self
            .transport
            .execute(&ApiRequest::post(&self.endpoints.refresh, body))
            .await?
            .error_for_status()?;

        let tokens: TokenResponse = response.json()?;
        let (pair, user) = tokens
            .into_pair(Some(&refresh_token))
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let access_token = pair.access_token().to_string();

        match user {
            Some(user) => self.session.set_credentials(pair, Some(user)),
            None => self.session.replace_credentials(pair),
        }
        info!("Access token refreshed");
        Ok(access_token)
    }

    /// Tell the server the refresh token is finished with
    pub(crate) async fn revoke(&self, refresh_token: &str) -> Result<(), ApiError> {
        let body = serde_json::to_value(LogoutRequest { refresh_token })?;
        self.transport
            .execute(&ApiRequest::post(&self.endpoints.logout, body))
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Best-effort server logout followed by a local clear
    pub(crate) async fn end_session(&self) {
        if let Some(refresh_token) = self.session.refresh_token() {
            if let Err(e) = self.revoke(&refresh_token).await {
                warn!(error = %e, "Server logout failed");
            }
        }
        self.session.clear();
    }
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("session", &self.session)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

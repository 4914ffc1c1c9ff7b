//! In-process stand-in for the backend, used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::config::Endpoints;
use crate::models::CredentialPair;

#[derive(Default)]
struct ServerState {
    users: HashMap<String, String>,
    issued: u32,
    valid_access: Option<String>,
    valid_refresh: Option<String>,
    requests: Vec<ApiRequest>,
    refresh_delay: Duration,
    refresh_fails: bool,
    always_reject: bool,
    offline: bool,
}

impl ServerState {
    fn issue(&mut self) -> (String, String) {
        self.issued += 1;
        let access = format!("access-{}", self.issued);
        let refresh = format!("refresh-{}", self.issued);
        self.valid_access = Some(access.clone());
        self.valid_refresh = Some(refresh.clone());
        (access, refresh)
    }

    fn token_body(&mut self) -> String {
        let (access, refresh) = self.issue();
        json!({ "access": access, "refresh": refresh }).to_string()
    }
}

/// Scripted backend: accepts `alice`/`good`, serves `admin/` as 403 and
/// every other unknown path as a protected resource.
pub(crate) struct FakeServer {
    endpoints: Endpoints,
    state: Mutex<ServerState>,
}

fn field<'a>(body: &'a Option<Value>, name: &str) -> Option<&'a str> {
    body.as_ref()
        .and_then(|b| b.get(name))
        .and_then(Value::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl FakeServer {
    pub fn new() -> Self {
        let mut state = ServerState::default();
        state.users.insert("alice".into(), "good".into());
        Self {
            endpoints: Endpoints::default(),
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    /// Issue a pair out of band, as if a login had already happened
    pub fn issue_tokens(&self) -> CredentialPair {
        let (access, refresh) = self.state().issue();
        CredentialPair::new(access, refresh).unwrap()
    }

    /// Invalidate the access token while keeping the refresh token valid
    pub fn expire_access_token(&self) {
        self.state().valid_access = None;
    }

    pub fn valid_refresh(&self) -> Option<String> {
        self.state().valid_refresh.clone()
    }

    pub fn set_refresh_fails(&self, fails: bool) {
        self.state().refresh_fails = fails;
    }

    pub fn set_always_reject(&self, reject: bool) {
        self.state().always_reject = reject;
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state().refresh_delay = delay;
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state().requests.clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| normalize(&r.path) == normalize(path))
            .count()
    }

    fn login(&self, state: &mut ServerState, body: &Option<Value>) -> ApiResponse {
        let (Some(username), Some(password)) = (field(body, "username"), field(body, "password"))
        else {
            return ApiResponse::new(400, r#"{"error": "Login and password fields is required"}"#);
        };
        if state.users.get(username).map(String::as_str) == Some(password) {
            ApiResponse::new(200, state.token_body())
        } else {
            ApiResponse::new(401, r#"{"error": "Invalid data"}"#)
        }
    }

    fn register(&self, state: &mut ServerState, body: &Option<Value>) -> ApiResponse {
        let required = ["first_name", "last_name", "username", "email", "password"];
        if required.iter().any(|name| field(body, name).is_none()) {
            return ApiResponse::new(400, r#"{"error": "This field may not be blank."}"#);
        }
        let username = field(body, "username").unwrap_or_default().to_string();
        if state.users.contains_key(&username) {
            return ApiResponse::new(400, r#"{"error": "This username is already in use."}"#);
        }
        let password = field(body, "password").unwrap_or_default().to_string();
        state.users.insert(username, password);
        ApiResponse::new(201, state.token_body())
    }

    fn refresh(&self, state: &mut ServerState, body: &Option<Value>) -> ApiResponse {
        let presented = field(body, "refresh");
        if state.refresh_fails || presented.is_none() || presented != state.valid_refresh.as_deref()
        {
            return ApiResponse::new(401, r#"{"detail": "Token is invalid or expired"}"#);
        }
        ApiResponse::new(200, state.token_body())
    }

    fn protected(&self, state: &ServerState, request: &ApiRequest) -> ApiResponse {
        if normalize(&request.path) == "admin/" {
            return ApiResponse::new(403, r#"{"detail": "Not allowed"}"#);
        }
        if state.always_reject
            || request.bearer.is_none()
            || request.bearer != state.valid_access
        {
            return ApiResponse::new(401, r#"{"detail": "Given token not valid"}"#);
        }
        ApiResponse::new(200, json!({ "path": request.path }).to_string())
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let path = normalize(&request.path);
        let delay = {
            let mut state = self.state();
            state.requests.push(request.clone());
            if state.offline {
                return Err(ApiError::NetworkUnreachable("connection refused".into()));
            }
            if path == normalize(&self.endpoints.refresh) {
                state.refresh_delay
            } else {
                Duration::ZERO
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        let response = if path == normalize(&self.endpoints.login) {
            self.login(&mut state, &request.body)
        } else if path == normalize(&self.endpoints.registration) {
            self.register(&mut state, &request.body)
        } else if path == normalize(&self.endpoints.refresh) {
            self.refresh(&mut state, &request.body)
        } else if path == normalize(&self.endpoints.logout) {
            ApiResponse::new(200, "")
        } else {
            self.protected(&state, request)
        };
        Ok(response)
    }
}

//! Route guard for protected views.
//!
//! A view renders only while the session holds a full token pair. Anything
//! else is sent to the login entry point together with the location the
//! user was trying to reach, so login can return them there.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::SessionStore;

/// Landing location after login when nothing was preserved
const DEFAULT_DESTINATION: &str = "/";

/// State carried along with a redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct RedirectState {
    pub from: String,
}

impl RedirectState {
    /// Where to go once the user has logged in
    pub fn destination(state: Option<&RedirectState>) -> &str {
        state
            .map(|s| s.from.as_str())
            .filter(|from| !from.is_empty())
            .unwrap_or(DEFAULT_DESTINATION)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    Redirect { to: String, state: RedirectState },
}

/// Redirect primitive supplied by the UI layer
pub trait Navigator {
    fn redirect(&self, target: &str, state: Option<RedirectState>);
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    session: SessionStore,
    login_path: String,
    public_paths: Vec<String>,
}

impl RouteGuard {
    pub fn new(session: SessionStore, login_path: impl Into<String>) -> Self {
        let login_path = login_path.into();
        Self {
            session,
            public_paths: vec![login_path.clone(), "/signup".to_string()],
            login_path,
        }
    }

    pub fn with_public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    fn is_public(&self, location: &str) -> bool {
        let path = location.split(['?', '#']).next().unwrap_or(location);
        self.public_paths.iter().any(|p| p == path)
    }

    /// Decide whether `location` may render right now
    pub fn check(&self, location: &str) -> GuardDecision {
        if self.is_public(location) || self.session.is_authenticated() {
            return GuardDecision::Render;
        }
        debug!(location, "Unauthenticated navigation, redirecting to login");
        GuardDecision::Redirect {
            to: self.login_path.clone(),
            state: RedirectState {
                from: location.to_string(),
            },
        }
    }

    /// Check `location` and redirect through `navigator` if needed.
    /// Returns `true` when the protected content may render.
    pub fn enforce(&self, location: &str, navigator: &dyn Navigator) -> bool {
        match self.check(location) {
            GuardDecision::Render => true,
            GuardDecision::Redirect { to, state } => {
                navigator.redirect(&to, Some(state));
                false
            }
        }
    }
}

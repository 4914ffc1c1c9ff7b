//! Application state for the terminal front end.
//!
//! `App` wires the configuration, session store, API client and route guard
//! together and implements each subcommand on top of them.

use std::cell::RefCell;
use std::io::{self, Write};

use anyhow::{Context, Result};
use sessiongate_core::api::ApiRequest;
use sessiongate_core::{AuthClient, Config, Navigator, RedirectState, RouteGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Navigator that records the redirect so the caller can run the login prompt
#[derive(Default)]
pub struct TerminalNavigator {
    pending: RefCell<Option<RedirectState>>,
}

impl TerminalNavigator {
    pub fn take_state(&self) -> Option<RedirectState> {
        self.pending.borrow_mut().take()
    }
}

impl Navigator for TerminalNavigator {
    fn redirect(&self, target: &str, state: Option<RedirectState>) {
        match state {
            Some(ref s) => eprintln!("Login required for {}, redirecting to {}", s.from, target),
            None => eprintln!("Redirecting to {}", target),
        }
        *self.pending.borrow_mut() = state;
    }
}

pub struct App {
    config: Config,
    client: AuthClient,
    guard: RouteGuard,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let session = config.open_session().context("Failed to open session")?;
        debug!(authenticated = session.is_authenticated(), "Session loaded");

        let client = AuthClient::from_config(&config, session.clone())?;
        let guard = RouteGuard::new(session, config.login_path.clone());
        Ok(Self {
            config,
            client,
            guard,
        })
    }

    /// Interactive login
    pub async fn login_interactive(&mut self) -> Result<()> {
        println!("\n=== Login ===\n");

        let username = match self.config.last_username.clone() {
            Some(last_user) => {
                let input = prompt(&format!("Username [{}]: ", last_user))?;
                if input.is_empty() {
                    last_user
                } else {
                    input
                }
            }
            None => prompt("Username: ")?,
        };
        let password = prompt_password()?;

        println!("\nAuthenticating...");
        let outcome = self.client.login(&username, &password).await?;

        self.config.last_username = Some(outcome.user.username.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Login successful! Welcome, {}.\n", outcome.user.display_name());
        Ok(())
    }

    /// Interactive account registration
    pub async fn signup_interactive(&mut self) -> Result<()> {
        println!("\n=== Create an account ===\n");

        let name = prompt("Name: ")?;
        let last_name = prompt("Last name: ")?;
        let username = prompt("Username: ")?;
        let email = prompt("Email: ")?;
        let password = prompt_password()?;

        println!("\nCreating account...");
        let outcome = self
            .client
            .signup(&name, &last_name, &username, &email, &password)
            .await?;

        self.config.last_username = Some(outcome.user.username.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Account created. Logged in as {}.\n", outcome.user.username);
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        if !self.client.session().is_authenticated() {
            println!("Not logged in.");
            return Ok(());
        }
        if let Err(e) = self.client.logout().await {
            // local session is gone either way
            warn!(error = %e, "Server logout failed");
        }
        println!("Logged out.");
        Ok(())
    }

    pub fn status(&self) {
        match self.client.session().snapshot() {
            Some(session) => {
                let who = session
                    .user
                    .as_ref()
                    .map(|u| u.display_name())
                    .unwrap_or_else(|| "unknown user".to_string());
                println!(
                    "Logged in as {} since {}",
                    who,
                    session.established_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
            None => println!("Not logged in."),
        }
        println!("API: {}", self.config.api_base_url);
    }

    /// Navigate to a protected location, logging in first if required
    pub async fn open(&mut self, location: &str) -> Result<()> {
        let navigator = TerminalNavigator::default();
        if self.guard.enforce(location, &navigator) {
            return self.fetch(location).await;
        }

        let state = navigator.take_state();
        self.login_interactive().await?;
        let destination = RedirectState::destination(state.as_ref()).to_string();
        info!(destination = %destination, "Resuming navigation after login");
        self.fetch(&destination).await
    }

    /// Fetch a location through the authenticated client; Ctrl-C abandons it
    async fn fetch(&self, location: &str) -> Result<()> {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        let result = self
            .client
            .send_cancellable(ApiRequest::get(location), &cancel)
            .await;
        watcher.abort();

        let response = result?;
        match serde_json::from_str::<serde_json::Value>(&response.body) {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            Err(_) => println!("{}", response.body),
        }
        Ok(())
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}

//! sessiongate - terminal front end for a token-authenticated API.
//!
//! Logs in, signs up and logs out against the configured backend, and
//! fetches protected resources through the route guard and the refreshing
//! API client.

mod app;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use sessiongate_core::{ApiError, Config};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of the daily rolling log file
const LOG_FILE_PREFIX: &str = "sessiongate.log";

const USAGE: &str = "\
Usage: sessiongate <command>

Commands:
  login          Log in and store the session
  signup         Create an account and log in
  logout         End the current session
  status         Show the current session
  get <path>     Fetch a protected resource (prompts for login if needed)";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Login,
    Signup,
    Logout,
    Status,
    Get { path: String },
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        match args.first().map(String::as_str) {
            None | Some("help") | Some("--help") | Some("-h") => Ok(Command::Help),
            Some("login") => Ok(Command::Login),
            Some("signup") => Ok(Command::Signup),
            Some("logout") => Ok(Command::Logout),
            Some("status") => Ok(Command::Status),
            Some("get") => {
                let path = args
                    .get(1)
                    .ok_or_else(|| anyhow!("get requires a path"))?;
                Ok(Command::Get { path: path.clone() })
            }
            Some(other) => Err(anyhow!("Unknown command: {}", other)),
        }
    }
}

/// Initialize the tracing subscriber for logging.
/// Keep the returned guard alive so the file writer flushes on exit.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Print an error the way the forms did: the taxonomy message first
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<ApiError>() {
        Some(api_err) => eprintln!("{} ({})", api_err.user_message(), api_err),
        None => eprintln!("Error: {:#}", err),
    }
}

async fn run(command: Command, config: Config) -> Result<()> {
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut app = App::new(config)?;
    match command {
        Command::Login => app.login_interactive().await,
        Command::Signup => app.signup_interactive().await,
        Command::Logout => app.logout().await,
        Command::Status => {
            app.status();
            Ok(())
        }
        Command::Get { path } => app.open(&path).await,
        Command::Help => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load config: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = init_tracing(config.log_dir().ok());
    info!("sessiongate starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return ExitCode::FAILURE;
        }
    };

    match run(command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

//! GitTrends CLI - sign in to GitHub from a terminal.
//!
//! Prints the GitHub authorize URL, waits for the redirect URI to be pasted
//! back, and stores the resulting token in the OS keychain.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use gittrends_core::{ApiClient, Config, CredentialStore, SessionAuthenticator};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: gittrends <command>

Commands:
  login    Sign in with GitHub
  status   Show the signed-in user
  token    Show whether a token is stored
  logout   Forget the stored token and user

Environment:
  RUST_LOG                   Log filter (default: warn)
  GITTRENDS_LOG_FILE=1       Also write logs to the cache directory
  GITTRENDS_API_BASE_URL     Token exchange backend
  GITTRENDS_GITHUB_BASE_URL  GitHub web base URL
  GITTRENDS_GRAPHQL_URL      GitHub GraphQL endpoint";

type Authenticator = SessionAuthenticator<ApiClient>;

/// Initialize the tracing subscriber for logging.
/// The returned guard must stay alive for file logs to be flushed.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_dir = std::env::var("GITTRENDS_LOG_FILE")
        .ok()
        .filter(|v| v == "1")
        .and_then(|_| Config::cache_dir().ok());

    match file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "gittrends.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("--help");
    if matches!(command, "--help" | "-h" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    let store = CredentialStore::system(&config)?;
    let client = ApiClient::new(&config).context("Failed to create HTTP client")?;
    let auth = Arc::new(SessionAuthenticator::new(client, store, &config));

    match command {
        "login" => login(&auth).await,
        "status" => {
            status(&auth);
            Ok(())
        }
        "token" => {
            let token = auth.token();
            if token.is_empty() {
                println!("No token stored");
            } else {
                println!("Token stored (type: {}, scope: {})", token.token_type, token.scope);
            }
            Ok(())
        }
        "logout" => {
            auth.log_out()?;
            println!("Signed out");
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    }
}

async fn login(auth: &Arc<Authenticator>) -> Result<()> {
    let events = auth.events();
    let started = events.subscribe_started(|| info!("Authorizing sign-in"));
    let completed = events.subscribe_completed(|success| {
        if success {
            info!("Sign-in session completed");
        } else {
            error!("Sign-in session failed");
        }
    });

    let result = run_login(auth).await;

    events.unsubscribe(started);
    events.unsubscribe(completed);
    result
}

async fn run_login(auth: &Arc<Authenticator>) -> Result<()> {
    let login_url = auth.begin_login().await.context("Could not start sign-in")?;

    println!("Open this URL in your browser to sign in with GitHub:\n\n  {}\n", login_url);
    print!("Paste the URL you were redirected to: ");
    io::stdout().flush()?;

    let callback_uri = tokio::task::spawn_blocking(|| -> io::Result<String> {
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await
    .context("Failed to read callback URL")??;

    auth.authorize_session(&callback_uri)
        .await
        .context("Sign-in failed")?;

    status(auth);
    Ok(())
}

fn status(auth: &Authenticator) {
    if auth.is_authenticated() {
        let identity = auth.identity();
        println!("Signed in as {} ({})", identity.alias, identity.display_name);
        if !identity.avatar_url.is_empty() {
            println!("Avatar: {}", identity.avatar_url);
        }
    } else if !auth.token().is_empty() {
        // Token saved but the user lookup never finished
        println!("Not signed in (a token is stored but the profile is missing; run `gittrends login`)");
    } else {
        println!("Not signed in");
    }
}

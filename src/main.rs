/// Circl Inbox - Main entry point
///
/// A terminal client for Circl direct messages: conversation list, threads,
/// unread badge, with background polling.
use anyhow::{Context, Result};
use clap::Parser;
use circl_inbox::config::{ApiConfig, RefreshConfig, Session};
use circl_inbox::services::{Messenger, Refresher};
use circl_inbox::storage::SessionStore;
use circl_inbox::cli;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "circl-inbox")]
#[command(about = "Circl Inbox - direct messages from the terminal")]
struct Args {
    /// Server URL; stored with the session once given
    #[arg(long)]
    server: Option<String>,

    /// Logged-in user id; stored with the session once given
    #[arg(long)]
    user_id: Option<i64>,

    /// Auth token sent as `Authorization: Token <token>`
    #[arg(long, env = "CIRCL_TOKEN")]
    token: Option<String>,

    /// Config directory for the session database (default: ~/.circl)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds between background refreshes
    #[arg(long, default_value = "45")]
    poll_interval: u64,

    /// Forget the stored session and exit
    #[arg(long)]
    logout: bool,

    /// Enable verbose logging (DEBUG level)
    #[arg(short, long)]
    verbose: bool,
}

fn config_dir(arg: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(path);
    }
    use directories::BaseDirs;
    let base_dirs = BaseDirs::new().context("Failed to get home directory")?;
    Ok(base_dirs.home_dir().join(".circl"))
}

/// Merge command-line flags over the stored session and persist the result
fn resolve_session(args: &Args, store: &SessionStore) -> Result<Session> {
    let stored = store.load_session()?;

    let base_url = args
        .server
        .clone()
        .or_else(|| stored.as_ref().map(|s| s.base_url.clone()))
        .unwrap_or_else(|| "https://circlapp.online/api".to_string());

    let user_id = args
        .user_id
        .or_else(|| stored.as_ref().map(|s| s.user_id))
        .context("No stored session; pass --user-id to log in")?;

    let auth_token = args
        .token
        .clone()
        .or_else(|| stored.as_ref().and_then(|s| s.auth_token.clone()));

    let session = Session {
        base_url,
        user_id,
        auth_token,
    };

    if stored.as_ref() != Some(&session) {
        store.save_session(&session)?;
        info!("Session saved for user {}", session.user_id);
    }
    Ok(session)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let dir = config_dir(args.config.clone())?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let store = SessionStore::open(dir.join("session.db"))?;

    if args.logout {
        store.clear_session()?;
        info!("Session cleared");
        return Ok(());
    }

    let session = Arc::new(resolve_session(&args, &store)?);
    info!("Starting Circl Inbox");
    info!("Server: {}", session.base_url);
    info!("User: {}", session.user_id);

    let messenger = Arc::new(Messenger::new(session, ApiConfig::default())?);

    let refresh = RefreshConfig {
        interval: Duration::from_secs(args.poll_interval.max(1)),
        ..RefreshConfig::default()
    };
    let refresher = Refresher::start(Arc::clone(&messenger), refresh);

    let outcome = cli::run_client_loop(Arc::clone(&messenger)).await;
    refresher.stop().await;

    outcome?;
    Ok(())
}

//! # tally
//!
//! Command-line front end for the Tally offline action queue.
//!
//! ## Commands
//!
//! - `log`, `respond-invite`, `friend-request`: queue an action
//! - `drain`: send queued actions to the server once
//! - `status`: show what is waiting
//! - `history`: page through activity history
//! - `clear`: drop every queued action
//! - `watch`: keep draining in the background until Ctrl-C
//!
//! ## Example
//!
//! ```bash
//! # Queue while offline
//! tally log --challenge steps-may 4200 --note "lunch walk"
//! tally friend-request user-42
//!
//! # Replay once back online
//! tally drain
//!
//! # Browse history against the built-in demo server
//! tally --mock history --limit 2
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod session;

use commands::{clear, drain, enqueue, history, status, watch};
use session::Session;

/// Command-line front end for the Tally offline action queue.
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the queue and configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: <data-dir>/tally.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-process mock server instead of HTTP (for testing/demo)
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Queue an activity log entry
    Log {
        /// Challenge the activity counts toward
        #[arg(long, short)]
        challenge: String,

        /// Amount to log
        value: i64,

        /// Optional note
        #[arg(long, short)]
        note: Option<String>,
    },

    /// Queue an answer to a challenge invite
    RespondInvite {
        /// Invite to answer
        invite_id: String,

        /// Decline instead of accepting
        #[arg(long)]
        decline: bool,
    },

    /// Queue a friend request
    FriendRequest {
        /// User to send the request to
        recipient_id: String,
    },

    /// Send queued actions to the server once
    Drain,

    /// Show queued actions
    Status,

    /// Page through activity history
    History {
        /// Only this challenge
        #[arg(long)]
        challenge: Option<String>,

        /// Rows per page
        #[arg(long, default_value = "20")]
        limit: u32,

        /// Continue after this timestamp (from a previous page)
        #[arg(long, requires = "before_id")]
        before_ts: Option<String>,

        /// Continue after this row id (from a previous page)
        #[arg(long, requires = "before_ts")]
        before_id: Option<String>,

        /// Fetch every page
        #[arg(long, conflicts_with_all = ["before_ts", "before_id"])]
        all: bool,
    },

    /// Drop every queued action
    Clear,

    /// Drain on a timer until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let session = Session::open(&data_dir, cli.config.as_deref(), cli.mock).await?;

    match cli.command {
        Commands::Log {
            challenge,
            value,
            note,
        } => {
            enqueue::log(&session, &challenge, value, note).await?;
        }
        Commands::RespondInvite { invite_id, decline } => {
            enqueue::respond_invite(&session, &invite_id, !decline).await?;
        }
        Commands::FriendRequest { recipient_id } => {
            enqueue::friend_request(&session, &recipient_id).await?;
        }
        Commands::Drain => {
            drain::run(&session).await?;
        }
        Commands::Status => {
            status::run(&session).await?;
        }
        Commands::History {
            challenge,
            limit,
            before_ts,
            before_id,
            all,
        } => {
            let cursor = match (before_ts, before_id) {
                (Some(ts), Some(id)) => Some(history::parse_cursor(&ts, &id)?),
                _ => None,
            };
            let query = history::HistoryQuery {
                challenge,
                limit,
                cursor,
                all,
            };
            history::run(&session, &query).await?;
        }
        Commands::Clear => {
            clear::run(&session).await?;
        }
        Commands::Watch => {
            watch::run(&session).await?;
        }
    }

    Ok(())
}

/// Install the log subscriber. `RUST_LOG` overrides the default level.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Get the default data directory for tally.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("app", "tally", "tally")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

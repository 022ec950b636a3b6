// src/cli/mod.rs — CLI definition (clap derive)

pub mod export;
pub mod patterns;
pub mod record;
pub mod suggest;
pub mod watch;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::core::engine::Engine;
use crate::infra::config::Config;
use crate::infra::paths;
use crate::patterns::types::Suggestion;

#[derive(Parser)]
#[command(
    name = "habitual",
    about = "Learns your action sequences and suggests what comes next",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Database path (defaults to the data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record one action
    Record {
        /// Action identifier, e.g. open_editor
        action: String,
        /// Opaque parameter, repeatable (key=value; JSON values accepted)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Mark the action as failed
        #[arg(long)]
        failed: bool,
        /// When it happened (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Show suggested next actions after an action
    Suggest {
        action: String,
        /// Evaluate as of this time (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Accept a suggestion: strengthens the pattern
    Accept { antecedent: String, consequent: String },
    /// Dismiss a suggestion: weakens the pattern
    Dismiss { antecedent: String, consequent: String },
    /// Save a pattern as a two-step macro
    Promote { antecedent: String, consequent: String },
    /// List learned patterns
    Patterns {
        /// Include patterns below the suggestion thresholds
        #[arg(long)]
        all: bool,
    },
    /// Replay the whole log into a fresh pattern store (Ctrl-C cancels)
    Rebuild,
    /// Apply time decay now and prune faded patterns
    Decay {
        /// Decay up to this time (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Export learned patterns as JSON
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Merge a pattern snapshot into the local store
    Import { file: PathBuf },
    /// Most frequently used actions
    Routines {
        /// How many to show
        #[arg(long, default_value = "10")]
        top: u32,
    },
    /// Read action ids from stdin, one per line, and print pushed suggestions
    Watch,
}

/// Open the engine over `db` or the default database.
pub fn open_engine(config: &Config, db: Option<&Path>) -> anyhow::Result<Engine> {
    let path = db.map(Path::to_path_buf).unwrap_or_else(paths::db_path);
    let engine = Engine::open(&path, config.clone())?;
    tracing::debug!(path = %path.display(), "database opened");
    Ok(engine)
}

/// Parse an optional RFC 3339 timestamp, defaulting to now.
pub fn parse_time(at: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .map_err(|e| anyhow::anyhow!("invalid timestamp '{}': {}", s, e))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

pub(crate) fn print_suggestion(s: &Suggestion) {
    println!(
        "  {:<24} score {:.2}  conf {:.2}  {}",
        s.consequent, s.score, s.confidence, s.message
    );
}

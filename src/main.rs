// src/main.rs — habitual entry point

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use habitual::cli::{self, Cli, Commands};
use habitual::infra::config::Config;
use habitual::infra::{logger, paths};
use habitual::patterns::types::{Decision, PatternKey};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    // Respects HABITUAL_LOG / RUST_LOG over the configured level
    logger::init_logging(&config.logging.level);

    if cli.db.is_none() {
        paths::ensure_dirs().await?;
    }
    let engine = Arc::new(cli::open_engine(&config, cli.db.as_deref())?);

    match cli.command {
        Commands::Record {
            action,
            params,
            failed,
            at,
        } => cli::record::run_record(&engine, &action, &params, failed, at.as_deref()),
        Commands::Suggest { action, at } => {
            cli::suggest::run_suggest(&engine, &action, at.as_deref())
        }
        Commands::Accept {
            antecedent,
            consequent,
        } => cli::suggest::run_feedback(
            &engine,
            PatternKey::new(antecedent, consequent),
            Decision::Accepted,
        ),
        Commands::Dismiss {
            antecedent,
            consequent,
        } => cli::suggest::run_feedback(
            &engine,
            PatternKey::new(antecedent, consequent),
            Decision::Dismissed,
        ),
        Commands::Promote {
            antecedent,
            consequent,
        } => cli::suggest::run_promote(&engine, PatternKey::new(antecedent, consequent)),
        Commands::Patterns { all } => cli::patterns::run_patterns(&engine, all),
        Commands::Rebuild => cli::patterns::run_rebuild(engine.clone()).await,
        Commands::Decay { at } => cli::patterns::run_decay(&engine, at.as_deref()),
        Commands::Export { output } => cli::export::run_export(&engine, output.as_deref()),
        Commands::Import { file } => cli::export::run_import(&engine, &file),
        Commands::Routines { top } => cli::patterns::run_routines(&engine, top),
        Commands::Watch => {
            let tick = Duration::from_secs(config.decay.tick_secs);
            cli::watch::run_watch(engine.clone(), tick).await
        }
    }
}

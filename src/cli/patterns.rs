// src/cli/patterns.rs — Inspect and maintain the pattern store

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::core::engine::Engine;
use crate::patterns::types::PatternState;

/// List patterns with their lifecycle state. Without `all`, only patterns
/// that can currently be suggested are shown.
pub fn run_patterns(engine: &Engine, all: bool) -> anyhow::Result<()> {
    let now = Utc::now();
    let rows: Vec<_> = engine
        .patterns()
        .into_iter()
        .map(|(key, stats)| {
            let state = engine.lifecycle(&key, now);
            (key, stats, state)
        })
        .filter(|(_, _, state)| all || *state == PatternState::Actionable)
        .collect();

    if rows.is_empty() {
        println!("No patterns yet. Record some actions first.");
        return Ok(());
    }

    println!(
        "  {:<40} {:>8} {:>8} {:>6} {:>6}  state",
        "pattern", "support", "episodes", "conf", "weight"
    );
    for (key, stats, state) in &rows {
        println!(
            "  {:<40} {:>8.2} {:>8.2} {:>6.2} {:>6.2}  {}",
            key.to_string(),
            stats.antecedent_count,
            stats.episode_count,
            stats.confidence(),
            stats.feedback_weight,
            state.as_str(),
        );
    }
    Ok(())
}

/// Most used actions, by raw count in the log.
pub fn run_routines(engine: &Engine, top: u32) -> anyhow::Result<()> {
    let routines = engine.routines(top)?;
    if routines.is_empty() {
        println!("No actions recorded.");
        return Ok(());
    }
    println!("Most frequent actions:");
    for (action, count) in routines {
        println!("  {:<32} {}x", action, count);
    }
    Ok(())
}

/// Replay the log on a blocking thread; Ctrl-C cancels and keeps the old
/// patterns.
pub async fn run_rebuild(engine: Arc<Engine>) -> anyhow::Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::Relaxed);
        }
    });

    let worker = engine.clone();
    let result = tokio::task::spawn_blocking(move || worker.rebuild(&*cancel)).await?;
    interrupt.abort();

    let report = result?;
    engine.checkpoint()?;
    println!(
        "Rebuilt {} patterns from {} events.",
        report.patterns, report.events
    );
    Ok(())
}

pub fn run_decay(engine: &Engine, at: Option<&str>) -> anyhow::Result<()> {
    let now = super::parse_time(at)?;
    let pruned = engine.decay(now);
    engine.checkpoint()?;
    println!(
        "Pruned {} faded patterns; {} remain.",
        pruned,
        engine.patterns().len()
    );
    Ok(())
}

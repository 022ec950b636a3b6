// src/cli/watch.rs — Long-running mode: stdin actions in, pushed suggestions out

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::core::engine::Engine;
use crate::patterns::types::NewEvent;

/// Read one action id per line from stdin and record it now. A leading `!`
/// marks the action as failed. Suggestions are printed as they are pushed;
/// decay runs every `tick` and the store is checkpointed on exit.
pub async fn run_watch(engine: Arc<Engine>, tick: Duration) -> anyhow::Result<()> {
    let mut pushed = engine.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match pushed.recv().await {
                Ok(s) => super::print_suggestion(&s),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "suggestion output fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut decay_tick = tokio::time::interval(tick);
    // The first tick fires immediately.
    decay_tick.tick().await;

    eprintln!("Watching stdin for actions (Ctrl-C to stop)...");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let event = match line.strip_prefix('!') {
                    Some(action) => NewEvent::failure(action.trim(), Utc::now()),
                    None => NewEvent::success(line, Utc::now()),
                };
                if let Err(e) = engine.record(event) {
                    if e.is_fatal() {
                        return Err(e.into());
                    }
                    tracing::warn!("record failed: {e}");
                }
            }
            _ = decay_tick.tick() => {
                let pruned = engine.decay(Utc::now());
                engine.checkpoint()?;
                tracing::debug!(pruned, "decay tick");
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    engine.checkpoint()?;
    printer.abort();
    Ok(())
}

// src/cli/suggest.rs — Pull suggestions and feed decisions back

use crate::core::engine::Engine;
use crate::patterns::types::{Decision, PatternKey};

pub fn run_suggest(engine: &Engine, action: &str, at: Option<&str>) -> anyhow::Result<()> {
    let now = super::parse_time(at)?;
    let suggestions = engine.suggest_for(action, now);
    if suggestions.is_empty() {
        println!("No suggestions after '{}'.", action);
        return Ok(());
    }
    println!("After '{}':", action);
    for s in &suggestions {
        super::print_suggestion(s);
    }
    Ok(())
}

/// Apply an accept/dismiss decision. An unknown pattern is reported, not
/// treated as a failure.
pub fn run_feedback(engine: &Engine, key: PatternKey, decision: Decision) -> anyhow::Result<()> {
    match engine.feedback(&key, decision) {
        Ok(weight) => {
            engine.checkpoint()?;
            println!("{}: weight now {:.3}", key, weight);
            Ok(())
        }
        Err(e) if e.is_noop() => {
            println!("No pattern {} (it may have decayed away).", key);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn run_promote(engine: &Engine, key: PatternKey) -> anyhow::Result<()> {
    let descriptor = engine.promote(&key)?;
    engine.checkpoint()?;
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

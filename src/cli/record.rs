// src/cli/record.rs — Record a single action

use crate::core::engine::Engine;
use crate::patterns::types::NewEvent;

/// Append one action, print its sequence number and any suggestions it
/// triggers, then checkpoint.
pub fn run_record(
    engine: &Engine,
    action: &str,
    params: &[String],
    failed: bool,
    at: Option<&str>,
) -> anyhow::Result<()> {
    let occurred_at = super::parse_time(at)?;
    let mut event = if failed {
        NewEvent::failure(action, occurred_at)
    } else {
        NewEvent::success(action, occurred_at)
    };
    for raw in params {
        let (key, value) = parse_param(raw)?;
        event = event.with_param(key, value);
    }

    let mut pushed = engine.subscribe();
    let seq = engine.record(event)?;
    engine.checkpoint()?;
    println!("Recorded #{} {}", seq, action);

    let mut first = true;
    while let Ok(s) = pushed.try_recv() {
        if first {
            println!();
            println!("Suggested next:");
            first = false;
        }
        super::print_suggestion(&s);
    }
    Ok(())
}

/// `key=value`. Values that parse as JSON keep their type; anything else is
/// a string.
pub fn parse_param(raw: &str) -> anyhow::Result<(String, serde_json::Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("parameter '{}' is not key=value", raw))?;
    if key.is_empty() {
        anyhow::bail!("parameter '{}' has an empty key", raw);
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

// src/cli/export.rs — Pattern snapshot export and import
//
// Snapshots are the JSON form of `PatternSnapshot`; importing merges them
// last-writer-wins per pattern.

use std::path::Path;

use crate::core::engine::Engine;
use crate::patterns::snapshot::PatternSnapshot;

/// Write the current patterns as JSON to `output`, or stdout.
pub fn run_export(engine: &Engine, output: Option<&str>) -> anyhow::Result<()> {
    let snapshot = engine.export_patterns();
    let json = snapshot.to_json()?;

    if let Some(path) = output {
        std::fs::write(path, &json)?;
        println!("Exported {} patterns to {}", snapshot.patterns.len(), path);
    } else {
        println!("{}", json);
    }
    Ok(())
}

pub fn run_import(engine: &Engine, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", file.display(), e))?;
    let snapshot = PatternSnapshot::from_json(&raw)
        .map_err(|e| anyhow::anyhow!("{} is not a pattern snapshot: {}", file.display(), e))?;
    let offered = snapshot.patterns.len();
    let changed = engine.import_patterns(snapshot);
    engine.checkpoint()?;
    println!("Imported {} of {} patterns.", changed, offered);
    Ok(())
}

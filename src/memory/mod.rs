// src/memory/mod.rs — Durable storage

pub mod schema;
pub mod store;

use rusqlite::Connection;
use std::path::Path;

/// Open (or create) the database at the given path and migrate it.
pub fn open_store(path: &Path) -> anyhow::Result<store::Store> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    // WAL keeps readers (export, status) off the writer's back
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA synchronous=FULL;")?;
    schema::run_migrations(&conn)?;
    Ok(store::Store::new(conn))
}

/// In-memory database (for testing).
pub fn in_memory_store() -> anyhow::Result<store::Store> {
    let conn = Connection::open_in_memory()?;
    schema::run_migrations(&conn)?;
    Ok(store::Store::new(conn))
}

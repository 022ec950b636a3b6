// src/memory/store.rs — SQLite operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

/// Low-level SQLite operations for the event log and the pattern checkpoint.
///
/// Rows come back undecoded; turning them into domain types (and deciding
/// what counts as corrupt) is the caller's job.
pub struct Store {
    conn: Connection,
}

/// An `action_events` row as stored.
#[derive(Debug, Clone)]
pub struct ActionEventRow {
    pub seq: i64,
    pub action_id: String,
    pub occurred_at: String,
    pub outcome: String,
    pub params_json: String,
}

/// A `pattern_stats` row as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternStatsRow {
    pub antecedent: String,
    pub consequent: String,
    pub antecedent_count: f64,
    pub episode_count: f64,
    pub last_seen_at: String,
    pub decayed_through: Option<String>,
    pub feedback_weight: f64,
}

/// An `antecedent_support` row as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportRow {
    pub action_id: String,
    pub count: f64,
    pub last_seen_at: String,
    pub decayed_through: Option<String>,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // -- Action Events --

    /// Insert one event inside its own transaction: the row is either fully
    /// committed or absent.
    pub fn insert_action_event(
        &self,
        seq: i64,
        action_id: &str,
        occurred_at: &str,
        outcome: &str,
        params_json: &str,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO action_events (seq, action_id, occurred_at, outcome, params_json, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![seq, action_id, occurred_at, outcome, params_json, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Events with `seq >= from_seq`, in sequence order.
    pub fn query_events_from(
        &self,
        from_seq: i64,
        limit: u32,
    ) -> anyhow::Result<Vec<ActionEventRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, action_id, occurred_at, outcome, params_json
             FROM action_events WHERE seq >= ?1
             ORDER BY seq ASC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![from_seq, limit], |row| {
            Ok(ActionEventRow {
                seq: row.get(0)?,
                action_id: row.get(1)?,
                occurred_at: row.get(2)?,
                outcome: row.get(3)?,
                params_json: row.get(4)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn max_event_seq(&self) -> anyhow::Result<Option<i64>> {
        let seq: Option<i64> =
            self.conn
                .query_row("SELECT MAX(seq) FROM action_events", [], |row| row.get(0))?;
        Ok(seq)
    }

    pub fn count_events(&self) -> anyhow::Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM action_events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Most frequently executed actions, most used first.
    pub fn query_action_frequencies(&self, limit: u32) -> anyhow::Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT action_id, COUNT(*) AS uses
             FROM action_events
             GROUP BY action_id
             ORDER BY uses DESC, action_id ASC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Pattern Stats --

    /// Replace the whole checkpoint (pairs, antecedent support and the
    /// processed sequence) in one transaction.
    pub fn write_checkpoint(
        &self,
        rows: &[PatternStatsRow],
        support: &[SupportRow],
        processed_through: i64,
    ) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM pattern_stats", [])?;
        tx.execute("DELETE FROM antecedent_support", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO pattern_stats (antecedent, consequent, antecedent_count,
                 episode_count, last_seen_at, decayed_through, feedback_weight)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.antecedent,
                    row.consequent,
                    row.antecedent_count,
                    row.episode_count,
                    row.last_seen_at,
                    row.decayed_through,
                    row.feedback_weight
                ])?;
            }
            let mut stmt = tx.prepare(
                "INSERT INTO antecedent_support (action_id, count, last_seen_at, decayed_through)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in support {
                stmt.execute(params![
                    row.action_id,
                    row.count,
                    row.last_seen_at,
                    row.decayed_through
                ])?;
            }
        }
        tx.execute(
            "INSERT INTO engine_meta (key, value) VALUES ('processed_through', ?1)
             ON CONFLICT(key) DO UPDATE SET value = ?1",
            params![processed_through.to_string()],
        )?;
        tx.execute(
            "INSERT INTO engine_meta (key, value) VALUES ('checkpointed_at', ?1)
             ON CONFLICT(key) DO UPDATE SET value = ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn query_pattern_stats(&self) -> anyhow::Result<Vec<PatternStatsRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT antecedent, consequent, antecedent_count, episode_count,
             last_seen_at, decayed_through, feedback_weight
             FROM pattern_stats ORDER BY antecedent, consequent",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(PatternStatsRow {
                antecedent: row.get(0)?,
                consequent: row.get(1)?,
                antecedent_count: row.get(2)?,
                episode_count: row.get(3)?,
                last_seen_at: row.get(4)?,
                decayed_through: row.get(5)?,
                feedback_weight: row.get(6)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn query_support(&self) -> anyhow::Result<Vec<SupportRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT action_id, count, last_seen_at, decayed_through
             FROM antecedent_support ORDER BY action_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SupportRow {
                action_id: row.get(0)?,
                count: row.get(1)?,
                last_seen_at: row.get(2)?,
                decayed_through: row.get(3)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_meta(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM engine_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

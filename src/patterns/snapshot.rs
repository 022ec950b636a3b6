// src/patterns/snapshot.rs — Export/import seam for syncing learned patterns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patterns::pattern_store::PatternStore;
use crate::patterns::types::{PatternKey, PatternStats};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Portable copy of a pattern store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub patterns: Vec<PatternRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    #[serde(flatten)]
    pub key: PatternKey,
    #[serde(flatten)]
    pub stats: PatternStats,
}

impl PatternSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// Anything that can hand out and take in pattern snapshots. Transports
/// (files, a mesh, a sync server) sit on top of this.
pub trait PatternSync {
    fn export_patterns(&self) -> PatternSnapshot;

    /// Merge `snapshot` in. Returns how many local entries changed.
    fn import_patterns(&mut self, snapshot: PatternSnapshot) -> usize;
}

impl PatternSync for PatternStore {
    fn export_patterns(&self) -> PatternSnapshot {
        PatternSnapshot {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            patterns: self
                .iter()
                .map(|(key, stats)| PatternRecord {
                    key: key.clone(),
                    stats: stats.clone(),
                })
                .collect(),
        }
    }

    /// Last-writer-wins per key on `last_seen_at`; ties keep the local entry.
    /// Imported counts are clamped so `episode_count <= antecedent_count`.
    fn import_patterns(&mut self, snapshot: PatternSnapshot) -> usize {
        if snapshot.version > SNAPSHOT_VERSION {
            tracing::warn!(
                version = snapshot.version,
                "snapshot is newer than this build; importing known fields only"
            );
        }

        let mut changed = 0;
        for PatternRecord { key, mut stats } in snapshot.patterns {
            let newer = self
                .get(&key)
                .map_or(true, |local| stats.last_seen_at > local.last_seen_at);
            if !newer {
                continue;
            }
            stats.antecedent_count = stats.antecedent_count.max(0.0);
            stats.episode_count = stats.episode_count.clamp(0.0, stats.antecedent_count);
            stats.feedback_weight = stats.feedback_weight.clamp(0.1, 2.0);
            self.insert(key, stats);
            changed += 1;
        }
        if changed > 0 {
            tracing::info!(changed, "patterns imported");
        }
        changed
    }
}

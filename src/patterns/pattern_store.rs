// src/patterns/pattern_store.rs — Pair statistics keyed by (antecedent, consequent)

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::memory::store::{PatternStatsRow, SupportRow};
use crate::patterns::event_log::encode_timestamp;
use crate::patterns::types::{ActionId, PatternKey, PatternStats};

/// Handle shared by the miner (writer), the feedback adjuster (writer) and
/// the ranker (reader).
pub type SharedPatterns = Arc<RwLock<PatternStore>>;

pub fn shared(store: PatternStore) -> SharedPatterns {
    Arc::new(RwLock::new(store))
}

/// Every mutation happens under one write guard, so a poisoned lock still
/// holds whole updates only.
pub fn read(patterns: &SharedPatterns) -> RwLockReadGuard<'_, PatternStore> {
    patterns.read().unwrap_or_else(|poisoned| {
        tracing::warn!("pattern store lock poisoned; continuing with last state");
        poisoned.into_inner()
    })
}

pub fn write(patterns: &SharedPatterns) -> RwLockWriteGuard<'_, PatternStore> {
    patterns.write().unwrap_or_else(|poisoned| {
        tracing::warn!("pattern store lock poisoned; continuing with last state");
        poisoned.into_inner()
    })
}

/// Resolved occurrences of one action as an antecedent, decayed like the
/// pair counts. New pairs take their support from here.
#[derive(Debug, Clone, PartialEq)]
pub struct AntecedentSupport {
    pub count: f64,
    pub last_seen_at: DateTime<Utc>,
    pub decayed_through: Option<DateTime<Utc>>,
}

/// Aggregate statistics per ordered action pair. Ordered so that exports,
/// checkpoints and comparisons are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternStore {
    patterns: BTreeMap<PatternKey, PatternStats>,
    support: BTreeMap<ActionId, AntecedentSupport>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, key: &PatternKey) -> Option<&PatternStats> {
        self.patterns.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &PatternKey) -> Option<&mut PatternStats> {
        self.patterns.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PatternKey, &PatternStats)> {
        self.patterns.iter()
    }

    /// All patterns whose antecedent is `antecedent`, by consequent.
    pub fn by_antecedent<'a>(
        &'a self,
        antecedent: &'a str,
    ) -> impl Iterator<Item = (&'a PatternKey, &'a PatternStats)> + 'a {
        let start = PatternKey::new(antecedent, "");
        self.patterns
            .range(start..)
            .take_while(move |(k, _)| k.antecedent == antecedent)
    }

    /// Decayed count of resolved occurrences of `antecedent`.
    pub fn support(&self, antecedent: &str) -> Option<&AntecedentSupport> {
        self.support.get(antecedent)
    }

    /// Count one more resolved occurrence of `antecedent`, seen at `at`,
    /// against its counter and every pattern it already heads.
    pub(crate) fn increment_support(&mut self, antecedent: &str, at: DateTime<Utc>) {
        match self.support.get_mut(antecedent) {
            Some(support) => {
                support.count += 1.0;
                support.last_seen_at = support.last_seen_at.max(at);
            }
            None => {
                self.support.insert(
                    antecedent.to_string(),
                    AntecedentSupport {
                        count: 1.0,
                        last_seen_at: at,
                        decayed_through: None,
                    },
                );
            }
        }

        let start = PatternKey::new(antecedent, "");
        for (_, stats) in self
            .patterns
            .range_mut(start..)
            .take_while(|(k, _)| k.antecedent == antecedent)
        {
            stats.antecedent_count += 1.0;
        }
    }

    /// Credit one episode `antecedent -> consequent` observed at `at`.
    pub(crate) fn credit_episode(&mut self, antecedent: &str, consequent: &str, at: DateTime<Utc>) {
        let key = PatternKey::new(antecedent, consequent);
        match self.patterns.get_mut(&key) {
            Some(stats) => {
                stats.episode_count += 1.0;
                // Imported entries may not have seen this occurrence's support.
                stats.antecedent_count = stats.antecedent_count.max(stats.episode_count);
                stats.last_seen_at = at;
            }
            None => {
                // Earlier unfollowed occurrences count against the new pair.
                let support = self
                    .support
                    .get(antecedent)
                    .map_or(1.0, |s| s.count)
                    .max(1.0);
                self.patterns
                    .insert(key, PatternStats::first_episode(support, at));
            }
        }
    }

    pub(crate) fn insert(&mut self, key: PatternKey, stats: PatternStats) {
        self.patterns.insert(key, stats);
    }

    /// Exponential decay of both counts by `exp(-rate·Δt)`, Δt in hours since
    /// the later of `last_seen_at` and the previous decay. Entries whose
    /// episode count drops below `floor` are removed. Returns how many.
    /// Antecedent counters decay and prune the same way.
    pub(crate) fn decay(&mut self, now: DateTime<Utc>, rate_per_hour: f64, floor: f64) -> usize {
        for stats in self.patterns.values_mut() {
            if let Some(factor) =
                decay_factor(now, stats.last_seen_at, &mut stats.decayed_through, rate_per_hour)
            {
                stats.antecedent_count *= factor;
                stats.episode_count *= factor;
            }
        }
        for support in self.support.values_mut() {
            if let Some(factor) = decay_factor(
                now,
                support.last_seen_at,
                &mut support.decayed_through,
                rate_per_hour,
            ) {
                support.count *= factor;
            }
        }
        self.support.retain(|_, s| s.count >= floor);

        let before = self.patterns.len();
        self.patterns.retain(|_, s| s.episode_count >= floor);
        before - self.patterns.len()
    }

    /// Overwrite weights for keys present in `other`.
    pub(crate) fn carry_weights_from(&mut self, other: &PatternStore) {
        for (key, stats) in self.patterns.iter_mut() {
            if let Some(prev) = other.get(key) {
                stats.feedback_weight = prev.feedback_weight;
            }
        }
    }

    pub fn to_rows(&self) -> Vec<PatternStatsRow> {
        self.patterns
            .iter()
            .map(|(key, s)| PatternStatsRow {
                antecedent: key.antecedent.clone(),
                consequent: key.consequent.clone(),
                antecedent_count: s.antecedent_count,
                episode_count: s.episode_count,
                last_seen_at: encode_timestamp(&s.last_seen_at),
                decayed_through: s.decayed_through.as_ref().map(encode_timestamp),
                feedback_weight: s.feedback_weight,
            })
            .collect()
    }

    pub fn support_rows(&self) -> Vec<SupportRow> {
        self.support
            .iter()
            .map(|(action, s)| SupportRow {
                action_id: action.clone(),
                count: s.count,
                last_seen_at: encode_timestamp(&s.last_seen_at),
                decayed_through: s.decayed_through.as_ref().map(encode_timestamp),
            })
            .collect()
    }

    /// Rebuild from checkpoint rows. Undecodable rows are skipped.
    pub fn from_rows(rows: &[PatternStatsRow], support: &[SupportRow]) -> Self {
        let mut store = Self::new();
        for row in support {
            let Ok(last_seen_at) = parse_timestamp(&row.last_seen_at) else {
                tracing::warn!("skipping support row for {}", row.action_id);
                continue;
            };
            store.support.insert(
                row.action_id.clone(),
                AntecedentSupport {
                    count: row.count,
                    last_seen_at,
                    decayed_through: row
                        .decayed_through
                        .as_deref()
                        .and_then(|s| parse_timestamp(s).ok()),
                },
            );
        }
        for row in rows {
            let last_seen_at = match parse_timestamp(&row.last_seen_at) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(
                        "skipping checkpoint row {} -> {}: {e}",
                        row.antecedent,
                        row.consequent
                    );
                    continue;
                }
            };
            let decayed_through = row
                .decayed_through
                .as_deref()
                .and_then(|s| parse_timestamp(s).ok());
            store.insert(
                PatternKey::new(row.antecedent.clone(), row.consequent.clone()),
                PatternStats {
                    antecedent_count: row.antecedent_count,
                    episode_count: row.episode_count,
                    last_seen_at,
                    decayed_through,
                    feedback_weight: row.feedback_weight,
                },
            );
        }
        store
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}

/// Factor for decaying from the later of `last_seen_at` and the previous
/// decay up to `now`; advances `decayed_through`. `None` when no time passed.
fn decay_factor(
    now: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    decayed_through: &mut Option<DateTime<Utc>>,
    rate_per_hour: f64,
) -> Option<f64> {
    let from = match *decayed_through {
        Some(prev) if prev > last_seen_at => prev,
        _ => last_seen_at,
    };
    if now <= from {
        return None;
    }
    *decayed_through = Some(now);
    let hours = (now - from).num_milliseconds() as f64 / 3_600_000.0;
    Some((-rate_per_hour * hours).exp())
}

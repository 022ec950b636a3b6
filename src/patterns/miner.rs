// src/patterns/miner.rs — Incremental episode mining over the event log

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};

use crate::infra::config::Config;
use crate::infra::errors::{HabitError, Result};
use crate::patterns::event_log::EventLog;
use crate::patterns::pattern_store::{self, PatternStore, SharedPatterns};
use crate::patterns::types::{ActionEvent, Outcome};
use crate::patterns::window::WindowIndex;

/// Knobs that shape what the miner counts.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    pub lookback: Duration,
    pub max_entries: usize,
    pub include_failures: bool,
    pub decay_rate_per_hour: f64,
    pub prune_floor: f64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for MinerConfig {
    fn from(config: &Config) -> Self {
        Self {
            lookback: Duration::seconds(config.window.lookback_secs as i64),
            max_entries: config.window.max_entries,
            include_failures: config.mining.include_failures,
            decay_rate_per_hour: config.decay.rate_per_hour,
            prune_floor: config.decay.prune_floor,
        }
    }
}

/// Polled by `rebuild` before each replayed event.
pub trait CancelCheck {
    fn is_cancelled(&self) -> bool;
}

impl CancelCheck for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Summary of a completed rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub events: u64,
    pub patterns: usize,
}

/// Sole owner of the window index and the only writer of pattern counts.
///
/// Events must be fed in strictly increasing sequence order; `catch_up` does
/// that from the log, which is how concurrent producers are serialized.
pub struct PatternMiner {
    config: MinerConfig,
    window: WindowIndex,
    patterns: SharedPatterns,
    processed_through: u64,
}

impl PatternMiner {
    pub fn new(config: MinerConfig, patterns: SharedPatterns) -> Self {
        let window = WindowIndex::new(config.lookback, config.max_entries);
        Self {
            config,
            window,
            patterns,
            processed_through: 0,
        }
    }

    pub fn patterns(&self) -> &SharedPatterns {
        &self.patterns
    }

    /// Highest sequence number folded into the store.
    pub fn processed_through(&self) -> u64 {
        self.processed_through
    }

    /// Fold one event into the store. Returns the number of episodes credited.
    ///
    /// Events at or below `processed_through` were already mined and are
    /// ignored.
    pub fn on_event(&mut self, event: &ActionEvent) -> usize {
        if event.seq <= self.processed_through {
            tracing::debug!(seq = event.seq, "event already mined, skipping");
            return 0;
        }
        self.processed_through = event.seq;

        let mut store = pattern_store::write(&self.patterns);
        mine_event(&mut self.window, &mut store, &self.config, event)
    }

    /// Mine every logged event past `processed_through`, in order. Returns the
    /// events mined.
    pub fn catch_up(&mut self, log: &EventLog) -> Result<Vec<ActionEvent>> {
        let mut mined = Vec::new();
        let mut iter = log.iterate(self.processed_through + 1);
        for item in iter.by_ref() {
            let event = item?;
            self.on_event(&event);
            mined.push(event);
        }
        // Corrupt records past the last event are not read again.
        self.processed_through = self.processed_through.max(iter.position() - 1);
        Ok(mined)
    }

    /// Continue from a checkpoint of the store taken at `processed_through`,
    /// then mine the tail of the log. Returns the tail events mined.
    ///
    /// The window is warmed by replaying events up to the checkpoint into a
    /// scratch store; the checkpointed counts are kept as they are, decay and
    /// imports included.
    pub fn resume(
        &mut self,
        log: &EventLog,
        checkpoint: PatternStore,
        processed_through: u64,
    ) -> Result<Vec<ActionEvent>> {
        let mut scratch = PatternStore::new();
        let mut window = WindowIndex::new(self.config.lookback, self.config.max_entries);
        for item in log.iterate(1) {
            let event = item?;
            if event.seq > processed_through {
                break;
            }
            mine_event(&mut window, &mut scratch, &self.config, &event);
        }

        *pattern_store::write(&self.patterns) = checkpoint;
        self.window = window;
        self.processed_through = processed_through;
        self.catch_up(log)
    }

    /// Replay the whole log into a fresh store and window, then swap them in.
    ///
    /// Checks `cancel` before every event. On cancellation or a log failure
    /// the live store and window are untouched. Feedback weights survive for
    /// patterns that still exist after the replay.
    pub fn rebuild(
        &mut self,
        log: &EventLog,
        cancel: &(impl CancelCheck + ?Sized),
    ) -> Result<RebuildReport> {
        let mut shadow = PatternStore::new();
        let mut window = WindowIndex::new(self.config.lookback, self.config.max_entries);
        let mut processed = 0u64;

        let mut iter = log.iterate(1);
        for item in iter.by_ref() {
            if cancel.is_cancelled() {
                tracing::warn!(processed, "rebuild cancelled; keeping previous patterns");
                return Err(HabitError::RebuildInterrupted { processed });
            }
            let event = item?;
            mine_event(&mut window, &mut shadow, &self.config, &event);
            processed += 1;
        }
        let last_seq = iter.position() - 1;

        let mut live = pattern_store::write(&self.patterns);
        shadow.carry_weights_from(&live);
        let report = RebuildReport {
            events: processed,
            patterns: shadow.len(),
        };
        *live = shadow;
        self.window = window;
        self.processed_through = last_seq;

        tracing::info!(
            events = report.events,
            patterns = report.patterns,
            "pattern store rebuilt from log"
        );
        Ok(report)
    }

    /// Apply time decay up to `now` and prune faded patterns. Returns the
    /// number pruned.
    pub fn decay(&mut self, now: DateTime<Utc>) -> usize {
        let pruned = pattern_store::write(&self.patterns).decay(
            now,
            self.config.decay_rate_per_hour,
            self.config.prune_floor,
        );
        if pruned > 0 {
            tracing::info!("Decay: pruned {} faded patterns", pruned);
        }
        pruned
    }
}

/// Core update for one event against a window and a store.
fn mine_event(
    window: &mut WindowIndex,
    store: &mut PatternStore,
    config: &MinerConfig,
    event: &ActionEvent,
) -> usize {
    if event.outcome == Outcome::Failure && !config.include_failures {
        return 0;
    }

    // Occurrences leaving the window unfollowed still count as support.
    for expired in window.evict(event.occurred_at) {
        if !expired.resolved {
            store.increment_support(&expired.action_id, expired.occurred_at);
        }
    }

    let mut credited = 0;
    for antecedent in window.candidates(event) {
        let Some(entry) = window.get_mut(&antecedent) else {
            continue;
        };
        if !entry.resolved {
            entry.resolved = true;
            store.increment_support(&antecedent, entry.occurred_at);
        }
        if !entry.has_credited(&event.action_id) {
            entry.credited.push(event.action_id.clone());
            store.credit_episode(&antecedent, &event.action_id, event.occurred_at);
            credited += 1;
        }
    }

    if let Some(superseded) = window.insert(event) {
        if !superseded.resolved {
            store.increment_support(&superseded.action_id, superseded.occurred_at);
        }
    }

    tracing::trace!(seq = event.seq, action = %event.action_id, credited, "event mined");
    credited
}

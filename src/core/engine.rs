// src/core/engine.rs — Embedding facade: log, miner, ranker and feedback wired together

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::infra::config::Config;
use crate::infra::errors::{HabitError, Result};
use crate::memory::{self, store::Store};
use crate::patterns::event_log::EventLog;
use crate::patterns::feedback::FeedbackAdjuster;
use crate::patterns::miner::{CancelCheck, MinerConfig, PatternMiner, RebuildReport};
use crate::patterns::pattern_store::{self, PatternStore, SharedPatterns};
use crate::patterns::ranker::{RankerConfig, SuggestionRanker};
use crate::patterns::snapshot::{PatternSnapshot, PatternSync};
use crate::patterns::types::{
    ActionEvent, Decision, MacroDescriptor, NewEvent, Outcome, PatternKey, PatternState,
    PatternStats, Suggestion,
};

/// Pushed suggestions buffered per subscriber before the oldest are dropped.
const PUSH_CAPACITY: usize = 64;

/// One suggestion engine over one database.
///
/// Producers call `record` from any thread. Mining runs under a single lock
/// and always catches up from the log in sequence order, so racing producers
/// never reorder what the miner sees. Suggestion queries only take the pattern
/// store's read lock.
pub struct Engine {
    config: Config,
    log: EventLog,
    miner: Mutex<PatternMiner>,
    patterns: SharedPatterns,
    ranker: SuggestionRanker,
    feedback: FeedbackAdjuster,
    notifier: broadcast::Sender<Suggestion>,
}

impl Engine {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path, config: Config) -> Result<Self> {
        let store = memory::open_store(path).map_err(HabitError::log_unavailable)?;
        Self::with_store(store, config)
    }

    /// Engine over a throwaway in-memory database.
    pub fn in_memory(config: Config) -> Result<Self> {
        let store = memory::in_memory_store().map_err(HabitError::log_unavailable)?;
        Self::with_store(store, config)
    }

    /// Build an engine over `store`.
    ///
    /// With a checkpoint the engine resumes from it and mines only the log
    /// tail, so decay, pruning and imports survive a restart. Without one, or
    /// when the checkpoint is ahead of the log, the store is rebuilt from the
    /// log, keeping checkpointed weights.
    pub fn with_store(store: Store, config: Config) -> Result<Self> {
        config.validate()?;

        let (checkpoint, checkpointed_through) = load_checkpoint(&store)?;
        let patterns = pattern_store::shared(checkpoint.clone());
        let log = EventLog::new(store)?;
        let last_seq = log.last_seq()?;

        let mut miner = PatternMiner::new(MinerConfig::from(&config), patterns.clone());
        match checkpointed_through {
            Some(through) if through <= last_seq => {
                let tail = miner.resume(&log, checkpoint, through)?;
                tracing::debug!(
                    through,
                    tail = tail.len(),
                    patterns = pattern_store::read(&patterns).len(),
                    "engine resumed from checkpoint"
                );
            }
            other => {
                if let Some(through) = other {
                    tracing::warn!(
                        through,
                        last_seq,
                        "checkpoint is ahead of the log; rebuilding"
                    );
                }
                let report = miner.rebuild(&log, &AtomicBool::new(false))?;
                tracing::debug!(
                    events = report.events,
                    patterns = report.patterns,
                    "engine rebuilt from log"
                );
            }
        }

        let (notifier, _) = broadcast::channel(PUSH_CAPACITY);

        Ok(Self {
            ranker: SuggestionRanker::new(RankerConfig::from(&config), patterns.clone()),
            feedback: FeedbackAdjuster::new(config.feedback.clone(), patterns.clone()),
            config,
            log,
            miner: Mutex::new(miner),
            patterns,
            notifier,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    fn miner(&self) -> MutexGuard<'_, PatternMiner> {
        self.miner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an event and mine everything logged so far. Returns the event's
    /// sequence number.
    ///
    /// Once the append commits this succeeds: a mining failure is logged and
    /// the event is picked up by the next successful catch-up.
    pub fn record(&self, event: NewEvent) -> Result<u64> {
        let seq = self.log.append(event)?;
        let mined = self.miner().catch_up(&self.log);
        match mined {
            Ok(mined) => self.notify(&mined),
            Err(err) => tracing::warn!(seq, "event recorded but not mined yet: {err}"),
        }
        Ok(seq)
    }

    /// Suggestions pushed after each mined successful action. Cadence is
    /// driven by `record`, never by a timer.
    pub fn subscribe(&self) -> broadcast::Receiver<Suggestion> {
        self.notifier.subscribe()
    }

    fn notify(&self, mined: &[ActionEvent]) {
        // Ranking with nobody listening would only burn cooldowns.
        if self.notifier.receiver_count() == 0 {
            return;
        }
        for event in mined.iter().filter(|e| e.outcome == Outcome::Success) {
            for suggestion in self.ranker.suggest_for(&event.action_id, event.occurred_at) {
                // Only fails once every receiver is gone.
                let _ = self.notifier.send(suggestion);
            }
        }
    }

    /// Pull API: suggestions after `last_action` as of `now`.
    pub fn suggest_for(&self, last_action: &str, now: DateTime<Utc>) -> Vec<Suggestion> {
        self.ranker.suggest_for(last_action, now)
    }

    pub fn feedback(&self, key: &PatternKey, decision: Decision) -> Result<f64> {
        self.feedback.record(key, decision)
    }

    pub fn promote(&self, key: &PatternKey) -> Result<MacroDescriptor> {
        self.feedback.promote_to_macro(key)
    }

    pub fn lifecycle(&self, key: &PatternKey, now: DateTime<Utc>) -> PatternState {
        self.ranker.lifecycle(key, now)
    }

    /// Replay the log from scratch. Cancellable through `cancel`.
    pub fn rebuild(&self, cancel: &(impl CancelCheck + ?Sized)) -> Result<RebuildReport> {
        self.miner().rebuild(&self.log, cancel)
    }

    /// Decay every pattern up to `now`. Returns the number pruned.
    pub fn decay(&self, now: DateTime<Utc>) -> usize {
        self.miner().decay(now)
    }

    /// Current patterns, ordered by key.
    pub fn patterns(&self) -> Vec<(PatternKey, PatternStats)> {
        pattern_store::read(&self.patterns)
            .iter()
            .map(|(k, s)| (k.clone(), s.clone()))
            .collect()
    }

    pub fn processed_through(&self) -> u64 {
        self.miner().processed_through()
    }

    /// Persist the pattern store next to the log, in one transaction.
    pub fn checkpoint(&self) -> Result<()> {
        let (rows, support, processed) = {
            let miner = self.miner();
            let store = pattern_store::read(&self.patterns);
            (store.to_rows(), store.support_rows(), miner.processed_through())
        };
        self.log
            .with_store(|s| s.write_checkpoint(&rows, &support, processed as i64))?;
        tracing::debug!(patterns = rows.len(), processed, "checkpoint written");
        Ok(())
    }

    pub fn export_patterns(&self) -> PatternSnapshot {
        pattern_store::read(&self.patterns).export_patterns()
    }

    pub fn import_patterns(&self, snapshot: PatternSnapshot) -> usize {
        // Serialize with mining.
        let _miner = self.miner();
        pattern_store::write(&self.patterns).import_patterns(snapshot)
    }

    /// Most used actions, most frequent first.
    pub fn routines(&self, limit: u32) -> Result<Vec<(String, u64)>> {
        self.log.action_frequencies(limit)
    }
}

/// Checkpointed store and the sequence it covers; `None` when no checkpoint
/// was ever written.
fn load_checkpoint(store: &Store) -> Result<(PatternStore, Option<u64>)> {
    let rows = store
        .query_pattern_stats()
        .map_err(HabitError::log_unavailable)?;
    let support = store.query_support().map_err(HabitError::log_unavailable)?;
    let through = store
        .get_meta("processed_through")
        .map_err(HabitError::log_unavailable)?
        .and_then(|v| match v.parse::<u64>() {
            Ok(seq) => Some(seq),
            Err(e) => {
                tracing::warn!("ignoring checkpoint marker '{v}': {e}");
                None
            }
        });
    Ok((PatternStore::from_rows(&rows, &support), through))
}

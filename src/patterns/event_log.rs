// src/patterns/event_log.rs — Durable, append-only action log

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::infra::errors::{HabitError, Result};
use crate::memory::store::{ActionEventRow, Store};
use crate::patterns::types::{ActionEvent, NewEvent, Outcome, Params};

const PAGE_SIZE: u32 = 256;

/// Append-only record of executed actions; the single source of truth for
/// the pattern store.
///
/// Producers may append from any thread. Sequence assignment and the durable
/// write happen under one lock, so sequence numbers are gapless and strictly
/// increasing in commit order.
pub struct EventLog {
    inner: Mutex<LogInner>,
}

struct LogInner {
    store: Store,
    next_seq: u64,
}

impl EventLog {
    pub fn new(store: Store) -> Result<Self> {
        let last = store.max_event_seq().map_err(HabitError::log_unavailable)?;
        let next_seq = last.map(|s| s as u64 + 1).unwrap_or(1);
        Ok(Self {
            inner: Mutex::new(LogInner { store, next_seq }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, LogInner>> {
        self.inner
            .lock()
            .map_err(|_| HabitError::log_unavailable("event log lock poisoned"))
    }

    /// Durably record an event and return its sequence number.
    ///
    /// On failure nothing is recorded and the sequence counter does not move;
    /// the caller decides whether to retry.
    pub fn append(&self, event: NewEvent) -> Result<u64> {
        let params_json = serde_json::to_string(&event.params)?;
        let occurred_at = encode_timestamp(&event.occurred_at);

        let mut inner = self.lock()?;
        let seq = inner.next_seq;
        inner
            .store
            .insert_action_event(
                seq as i64,
                &event.action_id,
                &occurred_at,
                event.outcome.as_str(),
                &params_json,
            )
            .map_err(|e| {
                tracing::error!(seq, action = %event.action_id, "append failed: {e}");
                HabitError::log_unavailable(e)
            })?;
        inner.next_seq = seq + 1;

        tracing::debug!(seq, action = %event.action_id, "event appended");
        Ok(seq)
    }

    /// Lazily replay events with `seq >= from`. Restartable from any offset.
    pub fn iterate(&self, from: u64) -> LogIter<'_> {
        LogIter {
            log: self,
            next: from.max(1),
            full_replay: from <= 1,
            buffer: VecDeque::new(),
            exhausted: false,
            decoded: 0,
            corrupt: 0,
        }
    }

    /// Highest assigned sequence number, 0 when empty.
    pub fn last_seq(&self) -> Result<u64> {
        Ok(self.lock()?.next_seq - 1)
    }

    pub fn len(&self) -> Result<u64> {
        let inner = self.lock()?;
        let count = inner
            .store
            .count_events()
            .map_err(HabitError::log_unavailable)?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Most used actions, for the routines report.
    pub fn action_frequencies(&self, limit: u32) -> Result<Vec<(String, u64)>> {
        let inner = self.lock()?;
        let rows = inner
            .store
            .query_action_frequencies(limit)
            .map_err(HabitError::log_unavailable)?;
        Ok(rows.into_iter().map(|(a, n)| (a, n as u64)).collect())
    }

    /// Run `f` against the underlying store while holding the log lock.
    pub fn with_store<T>(&self, f: impl FnOnce(&Store) -> anyhow::Result<T>) -> Result<T> {
        let inner = self.lock()?;
        f(&inner.store).map_err(HabitError::from)
    }

    fn fetch_page(&self, from: u64) -> Result<Vec<ActionEventRow>> {
        let inner = self.lock()?;
        inner
            .store
            .query_events_from(from as i64, PAGE_SIZE)
            .map_err(HabitError::log_unavailable)
    }
}

/// Paged iterator over the log. Corrupt records are skipped with a warning;
/// storage failures are yielded as errors.
pub struct LogIter<'a> {
    log: &'a EventLog,
    next: u64,
    full_replay: bool,
    buffer: VecDeque<ActionEvent>,
    exhausted: bool,
    decoded: usize,
    corrupt: usize,
}

impl LogIter<'_> {
    /// Records skipped so far because they failed to decode.
    pub fn corrupt_count(&self) -> usize {
        self.corrupt
    }

    /// Sequence number of the next record this iterator would yield. Every
    /// record below it was yielded or skipped as corrupt.
    pub fn position(&self) -> u64 {
        self.buffer.front().map_or(self.next, |event| event.seq)
    }

    fn refill(&mut self) -> Result<()> {
        let rows = self.log.fetch_page(self.next)?;
        if rows.len() < PAGE_SIZE as usize {
            self.exhausted = true;
        }
        for row in rows {
            self.next = row.seq as u64 + 1;
            match decode_row(&row) {
                Ok(event) => {
                    self.decoded += 1;
                    self.buffer.push_back(event);
                }
                Err(err) => {
                    self.corrupt += 1;
                    tracing::warn!("skipping record: {err}");
                }
            }
        }
        Ok(())
    }
}

impl Iterator for LogIter<'_> {
    type Item = Result<ActionEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.buffer.pop_front() {
                return Some(Ok(event));
            }
            if self.exhausted {
                if self.full_replay && self.decoded == 0 && self.corrupt > 0 {
                    let records = self.corrupt;
                    // Report once.
                    self.corrupt = 0;
                    return Some(Err(HabitError::CorruptLog { records }));
                }
                return None;
            }
            if let Err(err) = self.refill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
    }
}

pub(crate) fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_row(row: &ActionEventRow) -> Result<ActionEvent> {
    let seq = row.seq as u64;
    let corrupt = |reason: String| HabitError::CorruptRecord { seq, reason };

    let occurred_at = DateTime::parse_from_rfc3339(&row.occurred_at)
        .map_err(|e| corrupt(format!("bad timestamp '{}': {e}", row.occurred_at)))?
        .with_timezone(&Utc);
    let outcome = Outcome::parse(&row.outcome)
        .ok_or_else(|| corrupt(format!("unknown outcome '{}'", row.outcome)))?;
    let params: Params = serde_json::from_str(&row.params_json)
        .map_err(|e| corrupt(format!("bad params: {e}")))?;

    Ok(ActionEvent {
        seq,
        action_id: row.action_id.clone(),
        occurred_at,
        outcome,
        params,
    })
}

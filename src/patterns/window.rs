// src/patterns/window.rs — Sliding lookback window over recent actions

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::patterns::types::{ActionEvent, ActionId};

/// One live antecedent occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowEntry {
    pub action_id: ActionId,
    pub occurred_at: DateTime<Utc>,
    pub seq: u64,
    /// Counted into its patterns' support already.
    pub resolved: bool,
    /// Consequents already credited to this occurrence.
    pub credited: Vec<ActionId>,
}

impl WindowEntry {
    fn from_event(event: &ActionEvent) -> Self {
        Self {
            action_id: event.action_id.clone(),
            occurred_at: event.occurred_at,
            seq: event.seq,
            resolved: false,
            credited: Vec::new(),
        }
    }

    pub fn has_credited(&self, consequent: &str) -> bool {
        self.credited.iter().any(|c| c == consequent)
    }
}

/// Recent actions within the lookback window, at most one live occurrence per
/// distinct action.
///
/// Arrival order lives in a deque; the live occurrence of each action lives in
/// a map. A newer occurrence of the same action supersedes the older one, which
/// stays in the deque as a stale marker until it reaches the front. Eviction is
/// lazy: it runs when the next event arrives.
#[derive(Debug, Clone)]
pub struct WindowIndex {
    lookback: Duration,
    max_entries: usize,
    order: VecDeque<(u64, ActionId)>,
    live: HashMap<ActionId, WindowEntry>,
    newest: Option<DateTime<Utc>>,
}

impl WindowIndex {
    pub fn new(lookback: Duration, max_entries: usize) -> Self {
        Self {
            lookback,
            max_entries: max_entries.max(1),
            order: VecDeque::new(),
            live: HashMap::new(),
            newest: None,
        }
    }

    pub fn lookback(&self) -> Duration {
        self.lookback
    }

    /// Live occurrences.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Advance the clock to `now` and drop occurrences that fell out of the
    /// window (or overflowed capacity). Returns the live entries removed.
    pub fn evict(&mut self, now: DateTime<Utc>) -> Vec<WindowEntry> {
        let newest = match self.newest {
            Some(prev) if prev >= now => prev,
            _ => now,
        };
        self.newest = Some(newest);

        let mut evicted = Vec::new();
        while let Some((seq, action)) = self.order.front().cloned() {
            let is_live = self.live.get(&action).is_some_and(|e| e.seq == seq);
            if !is_live {
                self.order.pop_front();
                continue;
            }
            let expired = self
                .live
                .get(&action)
                .is_some_and(|e| e.occurred_at + self.lookback <= newest);
            // Leave room for the incoming event. Stale markers do not count.
            let overflow = self.live.len() >= self.max_entries;
            if !expired && !overflow {
                break;
            }
            self.order.pop_front();
            if let Some(entry) = self.live.remove(&action) {
                evicted.push(entry);
            }
        }
        evicted
    }

    /// Antecedent candidates for `event`, oldest first: live occurrences of
    /// other actions strictly before it in `(occurred_at, seq)` order and less
    /// than the lookback apart.
    pub fn candidates(&self, event: &ActionEvent) -> Vec<ActionId> {
        self.order
            .iter()
            .filter_map(|(seq, action)| {
                let entry = self.live.get(action).filter(|e| e.seq == *seq)?;
                let before = (entry.occurred_at, entry.seq) < event.order_key();
                let within = event.occurred_at - entry.occurred_at < self.lookback;
                (entry.action_id != event.action_id && before && within)
                    .then(|| entry.action_id.clone())
            })
            .collect()
    }

    pub fn get_mut(&mut self, action: &str) -> Option<&mut WindowEntry> {
        self.live.get_mut(action)
    }

    /// Add `event` as a candidate antecedent for later events. Returns the
    /// occurrence it supersedes, if any.
    pub fn insert(&mut self, event: &ActionEvent) -> Option<WindowEntry> {
        self.order.push_back((event.seq, event.action_id.clone()));
        let superseded = self
            .live
            .insert(event.action_id.clone(), WindowEntry::from_event(event));
        if self.order.len() > 2 * self.max_entries {
            self.compact();
        }
        superseded
    }

    /// Drop stale markers left behind by superseded occurrences.
    fn compact(&mut self) {
        let live = &self.live;
        self.order
            .retain(|(seq, action)| live.get(action).is_some_and(|e| e.seq == *seq));
    }
}

// src/patterns/ranker.rs — Ranked next-action suggestions with cooldown

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::infra::config::Config;
use crate::patterns::pattern_store::{self, SharedPatterns};
use crate::patterns::types::{PatternKey, PatternState, PatternStats, Suggestion};

#[derive(Debug, Clone)]
pub struct RankerConfig {
    pub min_support: f64,
    pub min_confidence: f64,
    pub top_k: usize,
    pub cooldown: Duration,
    pub recency_half_life: Duration,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RankerConfig {
    fn from(config: &Config) -> Self {
        Self {
            min_support: config.mining.min_support,
            min_confidence: config.mining.min_confidence,
            top_k: config.suggestions.top_k,
            cooldown: Duration::seconds(config.suggestions.cooldown_secs as i64),
            recency_half_life: Duration::milliseconds(
                (config.suggestions.recency_half_life_hours * 3_600_000.0) as i64,
            ),
        }
    }
}

/// Read-only view over the pattern store that turns patterns into
/// suggestions. The only state it owns is the transient cooldown cache.
pub struct SuggestionRanker {
    config: RankerConfig,
    patterns: SharedPatterns,
    recently_emitted: Mutex<HashMap<PatternKey, DateTime<Utc>>>,
}

struct Ranked {
    key: PatternKey,
    score: f64,
    confidence: f64,
    episodes: f64,
}

impl SuggestionRanker {
    pub fn new(config: RankerConfig, patterns: SharedPatterns) -> Self {
        Self {
            config,
            patterns,
            recently_emitted: Mutex::new(HashMap::new()),
        }
    }

    /// Top-K actionable next actions after `last_action`, best first.
    ///
    /// Pairs emitted less than the cooldown ago are suppressed, and everything
    /// returned here starts its own cooldown. Empty when nothing qualifies.
    pub fn suggest_for(&self, last_action: &str, now: DateTime<Utc>) -> Vec<Suggestion> {
        let mut ranked: Vec<Ranked> = {
            let store = pattern_store::read(&self.patterns);
            store
                .by_antecedent(last_action)
                .filter(|(_, s)| s.is_actionable(self.config.min_support, self.config.min_confidence))
                .map(|(key, s)| Ranked {
                    key: key.clone(),
                    score: self.score(s, now),
                    confidence: s.confidence(),
                    episodes: s.episode_count,
                })
                .collect()
        };
        if ranked.is_empty() {
            return Vec::new();
        }

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.episodes.partial_cmp(&a.episodes).unwrap_or(Ordering::Equal))
                .then_with(|| a.key.consequent.cmp(&b.key.consequent))
        });

        let mut emitted = self
            .recently_emitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let cooldown = self.config.cooldown;
        emitted.retain(|_, at| now - *at < cooldown);

        let suggestions: Vec<Suggestion> = ranked
            .into_iter()
            .filter(|r| !emitted.contains_key(&r.key))
            .take(self.config.top_k)
            .map(|r| Suggestion {
                message: format!(
                    "You often run '{}' after '{}'. Run it now?",
                    r.key.consequent, r.key.antecedent
                ),
                antecedent: r.key.antecedent,
                consequent: r.key.consequent,
                score: r.score,
                confidence: r.confidence,
                emitted_at: now,
            })
            .collect();

        for s in &suggestions {
            emitted.insert(s.key(), now);
        }
        if !suggestions.is_empty() {
            tracing::debug!(
                action = last_action,
                count = suggestions.len(),
                "suggestions emitted"
            );
        }
        suggestions
    }

    /// `confidence × feedback_weight × recency_boost`.
    pub fn score(&self, stats: &PatternStats, now: DateTime<Utc>) -> f64 {
        stats.confidence() * stats.feedback_weight * self.recency_boost(stats.last_seen_at, now)
    }

    /// 1.0 for a pattern seen just now, halving its excess over 0.5 every
    /// half-life.
    pub fn recency_boost(&self, last_seen_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_ms = (now - last_seen_at).num_milliseconds().max(0) as f64;
        let half_life_ms = self.config.recency_half_life.num_milliseconds().max(1) as f64;
        0.5 + 0.5 * (-age_ms / half_life_ms).exp2()
    }

    /// Where `key` sits in its lifecycle at `now`.
    pub fn lifecycle(&self, key: &PatternKey, now: DateTime<Utc>) -> PatternState {
        let store = pattern_store::read(&self.patterns);
        let Some(stats) = store.get(key) else {
            return PatternState::Unseen;
        };
        let in_cooldown = self
            .recently_emitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .is_some_and(|at| now - *at < self.config.cooldown);

        if in_cooldown {
            PatternState::Suggested
        } else if stats.is_actionable(self.config.min_support, self.config.min_confidence) {
            PatternState::Actionable
        } else if stats.decayed_through.is_some() {
            PatternState::Decayed
        } else {
            PatternState::Candidate
        }
    }
}

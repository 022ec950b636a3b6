// src/patterns/types.rs — Core data types for action mining

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, stable action identifier. Never interpreted by the core.
pub type ActionId = String;

/// Order-preserving key/value parameters, stored and forwarded untouched.
pub type Params = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

/// An event handed to the log by a producer. The sequence number is assigned
/// on append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub action_id: ActionId,
    pub occurred_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub params: Params,
}

impl NewEvent {
    pub fn success(action_id: impl Into<ActionId>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            action_id: action_id.into(),
            occurred_at,
            outcome: Outcome::Success,
            params: Params::new(),
        }
    }

    pub fn failure(action_id: impl Into<ActionId>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            outcome: Outcome::Failure,
            ..Self::success(action_id, occurred_at)
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// An event as recorded in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub seq: u64,
    pub action_id: ActionId,
    pub occurred_at: DateTime<Utc>,
    pub outcome: Outcome,
    #[serde(default)]
    pub params: Params,
}

impl ActionEvent {
    /// Total order used everywhere in mining: time first, sequence on ties.
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.occurred_at, self.seq)
    }
}

/// Ordered pair `(antecedent, consequent)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatternKey {
    pub antecedent: ActionId,
    pub consequent: ActionId,
}

impl PatternKey {
    pub fn new(antecedent: impl Into<ActionId>, consequent: impl Into<ActionId>) -> Self {
        Self {
            antecedent: antecedent.into(),
            consequent: consequent.into(),
        }
    }
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.antecedent, self.consequent)
    }
}

/// Aggregate statistics for one pattern.
///
/// Counts are `f64` because decay scales them. Both counts of one entry are
/// always scaled by the same factor, so `episode_count <= antecedent_count`
/// survives decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub antecedent_count: f64,
    pub episode_count: f64,
    pub last_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub decayed_through: Option<DateTime<Utc>>,
    pub feedback_weight: f64,
}

impl PatternStats {
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    /// First observed episode for a pair whose antecedent has `support`
    /// resolved occurrences so far.
    pub fn first_episode(support: f64, at: DateTime<Utc>) -> Self {
        Self {
            antecedent_count: support.max(1.0),
            episode_count: 1.0,
            last_seen_at: at,
            decayed_through: None,
            feedback_weight: Self::DEFAULT_WEIGHT,
        }
    }

    pub fn confidence(&self) -> f64 {
        if self.antecedent_count <= 0.0 {
            return 0.0;
        }
        (self.episode_count / self.antecedent_count).clamp(0.0, 1.0)
    }

    pub fn is_actionable(&self, min_support: f64, min_confidence: f64) -> bool {
        self.antecedent_count >= min_support && self.confidence() >= min_confidence
    }
}

/// A proposed next action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub antecedent: ActionId,
    pub consequent: ActionId,
    pub score: f64,
    pub confidence: f64,
    pub message: String,
    pub emitted_at: DateTime<Utc>,
}

impl Suggestion {
    pub fn key(&self) -> PatternKey {
        PatternKey::new(self.antecedent.clone(), self.consequent.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Dismissed,
}

/// A user's reaction to a suggestion. Folded into the pattern's weight and
/// then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub key: PatternKey,
    pub decision: Decision,
    pub at: DateTime<Utc>,
}

/// Composite action produced by promoting a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroDescriptor {
    pub id: String,
    pub name: String,
    pub steps: Vec<ActionId>,
    pub source: PatternKey,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Per-pattern lifecycle as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternState {
    /// No statistics for the pair.
    Unseen,
    /// Observed, thresholds not met.
    Candidate,
    /// Thresholds met.
    Actionable,
    /// Emitted recently, in cooldown.
    Suggested,
    /// Fell below thresholds through decay.
    Decayed,
}

impl PatternState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unseen => "unseen",
            Self::Candidate => "candidate",
            Self::Actionable => "actionable",
            Self::Suggested => "suggested",
            Self::Decayed => "decayed",
        }
    }
}

// src/patterns/feedback.rs — Accept/dismiss signals and macro promotion

use chrono::Utc;
use uuid::Uuid;

use crate::infra::config::FeedbackConfig;
use crate::infra::errors::{HabitError, Result};
use crate::patterns::pattern_store::{self, SharedPatterns};
use crate::patterns::types::{Decision, FeedbackRecord, MacroDescriptor, PatternKey};

/// Folds user decisions into pattern weights. Besides the miner, the only
/// writer of `PatternStats`.
pub struct FeedbackAdjuster {
    config: FeedbackConfig,
    patterns: SharedPatterns,
}

impl FeedbackAdjuster {
    pub fn new(config: FeedbackConfig, patterns: SharedPatterns) -> Self {
        Self { config, patterns }
    }

    /// Adjust the weight of `key` and return the new value.
    ///
    /// `UnknownPattern` means the pattern was pruned or never existed; callers
    /// treat it as a no-op.
    pub fn record(&self, key: &PatternKey, decision: Decision) -> Result<f64> {
        self.apply(FeedbackRecord {
            key: key.clone(),
            decision,
            at: Utc::now(),
        })
    }

    /// Fold a record into its pattern. The record is consumed; only the
    /// adjusted weight remains.
    pub fn apply(&self, record: FeedbackRecord) -> Result<f64> {
        let mut store = pattern_store::write(&self.patterns);
        let stats = store
            .get_mut(&record.key)
            .ok_or_else(|| HabitError::UnknownPattern {
                key: record.key.clone(),
            })?;

        let weight = match record.decision {
            Decision::Accepted => {
                (stats.feedback_weight * self.config.accept_factor).min(self.config.max_weight)
            }
            Decision::Dismissed => {
                (stats.feedback_weight * self.config.dismiss_factor).max(self.config.min_weight)
            }
        };
        stats.feedback_weight = weight;

        tracing::debug!(
            pattern = %record.key,
            decision = ?record.decision,
            weight,
            at = %record.at,
            "feedback applied"
        );
        Ok(weight)
    }

    /// Turn a pattern into a saved two-step macro and pin its weight at the
    /// maximum.
    pub fn promote_to_macro(&self, key: &PatternKey) -> Result<MacroDescriptor> {
        let mut store = pattern_store::write(&self.patterns);
        let stats = store
            .get_mut(key)
            .ok_or_else(|| HabitError::UnknownPattern { key: key.clone() })?;
        stats.feedback_weight = self.config.max_weight;
        let confidence = stats.confidence();

        let descriptor = MacroDescriptor {
            id: Uuid::new_v4().to_string(),
            name: format!("{}-then-{}", key.antecedent, key.consequent),
            steps: vec![key.antecedent.clone(), key.consequent.clone()],
            source: key.clone(),
            confidence,
            created_at: Utc::now(),
        };
        tracing::info!(pattern = %key, name = %descriptor.name, "pattern promoted to macro");
        Ok(descriptor)
    }
}

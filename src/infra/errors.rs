// src/infra/errors.rs — Error types for habitual

use thiserror::Error;

use crate::patterns::types::PatternKey;

#[derive(Error, Debug)]
pub enum HabitError {
    // Durability (fatal, surfaced to the operator)
    #[error("Event log unavailable: {reason}")]
    LogUnavailable { reason: String },

    #[error("Event log is unreadable: all {records} records failed to decode")]
    CorruptLog { records: usize },

    // Recoverable
    #[error("Corrupt record at seq {seq}: {reason}")]
    CorruptRecord { seq: u64, reason: String },

    #[error("Unknown pattern {key}")]
    UnknownPattern { key: PatternKey },

    #[error("Rebuild interrupted after {processed} events; previous patterns kept")]
    RebuildInterrupted { processed: u64 },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HabitError {
    pub fn log_unavailable(err: impl std::fmt::Display) -> Self {
        HabitError::LogUnavailable {
            reason: err.to_string(),
        }
    }

    /// Errors that need operator intervention rather than a retry or a skip.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HabitError::LogUnavailable { .. } | HabitError::CorruptLog { .. }
        )
    }

    /// Errors the caller should swallow.
    pub fn is_noop(&self) -> bool {
        matches!(self, HabitError::UnknownPattern { .. })
    }
}

pub type Result<T, E = HabitError> = std::result::Result<T, E>;

// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::errors::HabitError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub mining: MiningConfig,

    #[serde(default)]
    pub suggestions: SuggestionsConfig,

    #[serde(default)]
    pub decay: DecayConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Maximum gap between antecedent and consequent (W).
    pub lookback_secs: u64,
    /// Hard cap on live window entries.
    pub max_entries: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback_secs: 120,
            max_entries: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    pub min_support: f64,
    pub min_confidence: f64,
    /// Mine events whose outcome was a failure.
    pub include_failures: bool,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_support: 3.0,
            min_confidence: 0.5,
            include_failures: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionsConfig {
    pub top_k: usize,
    pub cooldown_secs: u64,
    pub recency_half_life_hours: f64,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            cooldown_secs: 300,
            recency_half_life_hours: 24.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// λ in `count *= exp(-λ·Δt)`, with Δt in hours.
    pub rate_per_hour: f64,
    pub prune_floor: f64,
    /// How often `watch` runs a decay pass.
    pub tick_secs: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            rate_per_hour: 0.01,
            prune_floor: 0.01,
            tick_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub min_weight: f64,
    pub max_weight: f64,
    pub accept_factor: f64,
    pub dismiss_factor: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            min_weight: 0.1,
            max_weight: 2.0,
            accept_factor: 1.2,
            dismiss_factor: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

/// Upper bound for every configured span, in seconds (one year).
pub const MAX_SPAN_SECS: u64 = 365 * 24 * 3600;

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break the confidence or weight bounds, or
    /// overflow time arithmetic.
    pub fn validate(&self) -> Result<(), HabitError> {
        check_span("window.lookback_secs", self.window.lookback_secs, 1)?;
        check_span("suggestions.cooldown_secs", self.suggestions.cooldown_secs, 0)?;
        check_span("decay.tick_secs", self.decay.tick_secs, 1)?;
        if self.window.max_entries == 0 {
            return Err(HabitError::Config("window.max_entries must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.mining.min_confidence) {
            return Err(HabitError::Config(format!(
                "mining.min_confidence must be within [0, 1], got {}",
                self.mining.min_confidence
            )));
        }
        if !(self.decay.rate_per_hour.is_finite() && self.decay.rate_per_hour >= 0.0) {
            return Err(HabitError::Config("decay.rate_per_hour must be >= 0".into()));
        }
        let fb = &self.feedback;
        if fb.min_weight <= 0.0 || fb.min_weight > fb.max_weight {
            return Err(HabitError::Config(format!(
                "feedback weights must satisfy 0 < min <= max, got [{}, {}]",
                fb.min_weight, fb.max_weight
            )));
        }
        let half_life = self.suggestions.recency_half_life_hours;
        let max_hours = (MAX_SPAN_SECS / 3600) as f64;
        if !(half_life > 0.0 && half_life <= max_hours) {
            return Err(HabitError::Config(format!(
                "suggestions.recency_half_life_hours must be within (0, {max_hours}], got {half_life}"
            )));
        }
        Ok(())
    }
}

fn check_span(name: &str, secs: u64, min: u64) -> Result<(), HabitError> {
    if secs < min || secs > MAX_SPAN_SECS {
        return Err(HabitError::Config(format!(
            "{name} must be within [{min}, {MAX_SPAN_SECS}], got {secs}"
        )));
    }
    Ok(())
}

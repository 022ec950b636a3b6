// src/patterns/mod.rs — Action sequence mining and next-action suggestions

pub mod event_log;
pub mod feedback;
pub mod miner;
pub mod pattern_store;
pub mod ranker;
pub mod snapshot;
pub mod types;
pub mod window;

pub use event_log::EventLog;
pub use feedback::FeedbackAdjuster;
pub use miner::{CancelCheck, MinerConfig, PatternMiner, RebuildReport};
pub use pattern_store::{PatternStore, SharedPatterns};
pub use ranker::{RankerConfig, SuggestionRanker};
pub use snapshot::{PatternSnapshot, PatternSync};
pub use types::{
    ActionEvent, Decision, MacroDescriptor, NewEvent, Outcome, PatternKey, PatternState,
    PatternStats, Suggestion,
};

//! Engine error type
//!
//! The simulation itself never fails; these cover configuration and host edges.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to parse settings: {0}")]
    SettingsParse(#[from] serde_json::Error),
    #[error("invalid setting `{field}`: {reason}")]
    InvalidSetting {
        field: &'static str,
        reason: &'static str,
    },
    #[error("unknown ruleset `{0}`")]
    UnknownRuleset(String),
    #[error("host channel closed")]
    ChannelClosed,
    #[error("host surface unavailable: {0}")]
    Surface(String),
}

//! Error types shared across the day-cycle crates

use thiserror::Error;

use crate::{AssetId, ConditionId, FrameRate};

/// Core day-cycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DayCycleError {
    // Configuration errors
    #[error("Invalid frame rate: {0:?}")]
    InvalidFrameRate(FrameRate),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // Precondition violations
    #[error("Timeline has zero duration")]
    ZeroDuration,

    #[error("No timeline assigned")]
    NoTimeline,

    #[error("Re-entrant advance while an evaluation is in progress")]
    ReentrantAdvance,

    // Composition errors
    #[error("Unknown timeline asset: {0}")]
    UnknownAsset(AssetId),

    #[error("Invalid timeline asset {asset}: {reason}")]
    InvalidAsset { asset: AssetId, reason: String },

    #[error("Unknown condition: {0}")]
    UnknownCondition(ConditionId),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for day-cycle operations
pub type DayCycleResult<T> = Result<T, DayCycleError>;

//! Player errors

use daycycle_core::{DayCycleError, FrameRate};
use thiserror::Error;

/// Precondition violations reported by a [`Player`](crate::Player)
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PlayerError {
    #[error("Re-entrant advance while an evaluation is in progress")]
    ReentrantAdvance,

    #[error("No timeline assigned")]
    NoTimeline,

    #[error("Timeline has zero duration")]
    ZeroDuration,

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(FrameRate),
}

impl From<PlayerError> for DayCycleError {
    fn from(err: PlayerError) -> Self {
        match err {
            PlayerError::ReentrantAdvance => DayCycleError::ReentrantAdvance,
            PlayerError::NoTimeline => DayCycleError::NoTimeline,
            PlayerError::ZeroDuration => DayCycleError::ZeroDuration,
            PlayerError::InvalidFrameRate(rate) => DayCycleError::InvalidFrameRate(rate),
        }
    }
}

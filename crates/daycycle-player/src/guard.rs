//! Evaluation guard
//!
//! While a guard is alive the player refuses to advance and queues transport
//! operations as latent actions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use daycycle_core::{FrameTime, UpdatePositionMethod};

use crate::{ExplicitEvent, NetworkSnapshot, PlayerError};

/// Shared "evaluation in progress" flag
#[derive(Clone, Debug, Default)]
pub struct EvaluationFlag(Arc<AtomicBool>);

impl EvaluationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Acquire the flag; fails if an evaluation is already running
    pub fn acquire(&self) -> Result<EvaluationGuard, PlayerError> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PlayerError::ReentrantAdvance)?;
        Ok(EvaluationGuard { flag: self.clone() })
    }
}

/// Scope of one evaluation; released on drop
#[derive(Debug)]
pub struct EvaluationGuard {
    flag: EvaluationFlag,
}

impl Drop for EvaluationGuard {
    fn drop(&mut self) {
        self.flag.0.store(false, Ordering::Release);
    }
}

/// Operation deferred until the current evaluation finishes
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LatentAction {
    Play,
    PlayLooping(i32),
    Pause,
    Stop(FrameTime),
    SetPosition {
        time: FrameTime,
        method: UpdatePositionMethod,
        has_jumped: bool,
    },
    ApplySnapshot(NetworkSnapshot),
    ApplyEvent(ExplicitEvent),
}

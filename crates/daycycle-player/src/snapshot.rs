//! Replicated playback state and explicit events

use daycycle_core::{FrameTime, PlayerStatus, SerialNumber, UpdatePositionMethod};

/// Role of a player within a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum NetRole {
    /// No replication; authors its own serials and finishes on its own
    #[default]
    Standalone,
    /// Authoritative node; publishes snapshots and explicit events
    Authority,
    /// Follows the authority
    Passive,
}

impl NetRole {
    /// Whether this node advances the serial when it changes state
    #[inline]
    pub fn authors_serials(self) -> bool {
        matches!(self, NetRole::Standalone | NetRole::Authority)
    }

    #[inline]
    pub fn is_authority(self) -> bool {
        self == NetRole::Authority
    }

    #[inline]
    pub fn is_passive(self) -> bool {
        self == NetRole::Passive
    }
}

/// Latest observed authoritative playback state.
///
/// Delivered unordered and possibly stale; only the newest one matters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkSnapshot {
    /// Display-rate position
    pub position: FrameTime,
    pub status: PlayerStatus,
    pub loop_count: i32,
    pub serial: SerialNumber,
}

impl Default for NetworkSnapshot {
    fn default() -> Self {
        NetworkSnapshot {
            position: FrameTime::ZERO,
            status: PlayerStatus::Stopped,
            loop_count: 0,
            serial: SerialNumber::ZERO,
        }
    }
}

/// Reliable, ordered transition published by the authority
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExplicitEvent {
    /// Position set through jump, play or scrub
    PositionUpdate {
        method: UpdatePositionMethod,
        time: FrameTime,
        serial: SerialNumber,
    },
    /// Stopped at `time`
    Stopped { time: FrameTime, serial: SerialNumber },
    /// Reached the end of playback at `time`
    Finished { time: FrameTime, serial: SerialNumber },
    /// Play rate changed; followers discard their samples
    PlayRateChanged { rate: f32, serial: SerialNumber },
}

impl ExplicitEvent {
    pub fn serial(&self) -> SerialNumber {
        match *self {
            ExplicitEvent::PositionUpdate { serial, .. }
            | ExplicitEvent::Stopped { serial, .. }
            | ExplicitEvent::Finished { serial, .. }
            | ExplicitEvent::PlayRateChanged { serial, .. } => serial,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExplicitEvent::PositionUpdate { .. } => "position_update",
            ExplicitEvent::Stopped { .. } => "stopped",
            ExplicitEvent::Finished { .. } => "finished",
            ExplicitEvent::PlayRateChanged { .. } => "play_rate_changed",
        }
    }
}

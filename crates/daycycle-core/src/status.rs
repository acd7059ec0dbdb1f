//! Playback status and position-update classification

use std::fmt;

/// Playback state of a player
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PlayerStatus {
    #[default]
    Stopped = 0x00,
    Playing = 0x01,
    Paused = 0x02,
    /// Entered and left explicitly, never reached through looping
    Scrubbing = 0x03,
}

impl PlayerStatus {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(PlayerStatus::Stopped),
            0x01 => Some(PlayerStatus::Playing),
            0x02 => Some(PlayerStatus::Paused),
            0x03 => Some(PlayerStatus::Scrubbing),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerStatus::Stopped => "Stopped",
            PlayerStatus::Playing => "Playing",
            PlayerStatus::Paused => "Paused",
            PlayerStatus::Scrubbing => "Scrubbing",
        };
        f.write_str(name)
    }
}

/// How a new position is reached
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum UpdatePositionMethod {
    /// Sweep from the previous position, firing everything in between
    Play = 0x00,
    /// Teleport; nothing in between is evaluated
    #[default]
    Jump = 0x01,
    /// Teleport while scrubbing
    Scrub = 0x02,
}

impl UpdatePositionMethod {
    /// Evaluation status implied by the method
    pub fn evaluation_status(self) -> PlayerStatus {
        match self {
            UpdatePositionMethod::Play => PlayerStatus::Playing,
            UpdatePositionMethod::Jump => PlayerStatus::Stopped,
            UpdatePositionMethod::Scrub => PlayerStatus::Scrubbing,
        }
    }

    /// Method used to replay catch-up moves for a player in `status`
    pub fn for_status(status: PlayerStatus) -> Self {
        match status {
            PlayerStatus::Playing => UpdatePositionMethod::Play,
            PlayerStatus::Scrubbing => UpdatePositionMethod::Scrub,
            _ => UpdatePositionMethod::Jump,
        }
    }
}

/// Direction of travel through a timeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlayDirection {
    Forwards,
    Backwards,
}

impl PlayDirection {
    #[inline]
    pub fn from_rate(rate: f32) -> Self {
        if rate < 0.0 {
            PlayDirection::Backwards
        } else {
            PlayDirection::Forwards
        }
    }

    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            PlayDirection::Forwards => 1.0,
            PlayDirection::Backwards => -1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_byte_roundtrip() {
        for status in [
            PlayerStatus::Stopped,
            PlayerStatus::Playing,
            PlayerStatus::Paused,
            PlayerStatus::Scrubbing,
        ] {
            assert_eq!(PlayerStatus::from_byte(status.to_byte()), Some(status));
        }
        assert_eq!(PlayerStatus::from_byte(0x7f), None);
    }

    #[test]
    fn test_method_status_mapping() {
        assert_eq!(
            UpdatePositionMethod::Jump.evaluation_status(),
            PlayerStatus::Stopped
        );
        assert_eq!(
            UpdatePositionMethod::for_status(PlayerStatus::Paused),
            UpdatePositionMethod::Jump
        );
        assert_eq!(PlayDirection::from_rate(-0.5), PlayDirection::Backwards);
    }
}

use serde::{Deserialize, Serialize};

use super::IntentState;
use crate::ir::FanSignal;

/// Medium speed activates at 50% and above
pub const MEDIUM_THRESHOLD: u8 = 50;
/// High speed activates at 75% and above
pub const HIGH_THRESHOLD: u8 = 75;

/// Maps a continuous speed onto the remote's discrete speed buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedTiers {
    pub medium: u8,
    pub high: u8,
}

impl SpeedTiers {
    pub fn new(medium: u8, high: u8) -> Self {
        Self { medium, high }
    }

    pub fn signal_for(&self, speed: u8) -> FanSignal {
        if speed < self.medium {
            FanSignal::Low
        } else if speed < self.high {
            FanSignal::Medium
        } else {
            FanSignal::High
        }
    }
}

impl Default for SpeedTiers {
    fn default() -> Self {
        Self::new(MEDIUM_THRESHOLD, HIGH_THRESHOLD)
    }
}

/// Pick the signal that moves the fan from `previous` to `current`, if any
pub fn translate(
    current: &IntentState,
    previous: &IntentState,
    tiers: &SpeedTiers,
) -> Option<FanSignal> {
    if current.on != previous.on {
        if current.on {
            Some(tiers.signal_for(current.speed))
        } else {
            Some(FanSignal::Off)
        }
    } else if current.on && current.speed != previous.speed {
        Some(tiers.signal_for(current.speed))
    } else {
        None
    }
}

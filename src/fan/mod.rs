pub mod accessory;
pub mod coalescer;
pub mod state_sink;
pub mod translator;

pub use accessory::FanAccessory;
pub use coalescer::{CoalescerSettings, UpdateCoalescer};
pub use state_sink::{JsonFileStateSink, StateSink};
pub use translator::{translate, SpeedTiers};

use serde::{Deserialize, Serialize};

pub const MAX_SPEED: u8 = 100;

/// Desired fan state as last requested
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentState {
    pub on: bool,
    /// Rotation speed in percent
    pub speed: u8,
}

impl IntentState {
    pub fn new(on: bool, speed: u8) -> Self {
        Self {
            on,
            speed: speed.min(MAX_SPEED),
        }
    }

    pub fn apply(&mut self, update: FanUpdate) {
        match update {
            FanUpdate::On(on) => self.on = on,
            FanUpdate::Speed(speed) => self.speed = speed.min(MAX_SPEED),
        }
    }
}

/// Independently debounced fields of [`IntentState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanField {
    On,
    Speed,
}

impl FanField {
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        match self {
            FanField::On => 0,
            FanField::Speed => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanUpdate {
    On(bool),
    Speed(u8),
}

impl FanUpdate {
    pub fn field(&self) -> FanField {
        match self {
            FanUpdate::On(_) => FanField::On,
            FanUpdate::Speed(_) => FanField::Speed,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FanError {
    #[error("Service communication failure: serial link not ready")]
    CommunicationFailure,

    #[error("Update coalescer stopped")]
    CoalescerStopped,
}

pub type Result<T> = std::result::Result<T, FanError>;

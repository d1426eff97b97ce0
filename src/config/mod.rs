use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fan::translator::{HIGH_THRESHOLD, MEDIUM_THRESHOLD};
use crate::fan::{CoalescerSettings, SpeedTiers, MAX_SPEED};
use crate::serial::protocol::{FRAGMENT_PACING, MAX_FRAGMENT_SAMPLES};
use crate::serial::{ProtocolSettings, BAUD_RATE};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Runtime settings. Every field has a default, so a config file only needs
/// the values it wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial port of the IR blaster, e.g. `/dev/ttyACM0`
    pub port: Option<String>,
    pub baud_rate: u32,
    pub ir_file: PathBuf,
    pub state_file: PathBuf,
    pub debounce_ms: u64,
    pub medium_threshold: u8,
    pub high_threshold: u8,
    pub reconnect_interval_ms: u64,
    pub max_fragment_samples: usize,
    pub fragment_pacing_ms: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: BAUD_RATE,
            ir_file: PathBuf::from("Remote.ir"),
            state_file: PathBuf::from("fan_state.json"),
            debounce_ms: 500,
            medium_threshold: MEDIUM_THRESHOLD,
            high_threshold: HIGH_THRESHOLD,
            reconnect_interval_ms: 5000,
            max_fragment_samples: MAX_FRAGMENT_SAMPLES,
            fragment_pacing_ms: FRAGMENT_PACING.as_millis() as u64,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Read a JSON config file, or use the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str(&text)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be positive".to_string()));
        }
        if self.medium_threshold > MAX_SPEED || self.high_threshold > MAX_SPEED {
            return Err(ConfigError::Invalid(format!(
                "speed thresholds must be within 0..={}",
                MAX_SPEED
            )));
        }
        if self.medium_threshold > self.high_threshold {
            return Err(ConfigError::Invalid(format!(
                "medium_threshold ({}) above high_threshold ({})",
                self.medium_threshold, self.high_threshold
            )));
        }
        if self.max_fragment_samples == 0 {
            return Err(ConfigError::Invalid(
                "max_fragment_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn speed_tiers(&self) -> SpeedTiers {
        SpeedTiers::new(self.medium_threshold, self.high_threshold)
    }

    pub fn coalescer_settings(&self) -> CoalescerSettings {
        CoalescerSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            tiers: self.speed_tiers(),
        }
    }

    pub fn protocol_settings(&self) -> ProtocolSettings {
        ProtocolSettings {
            max_fragment_samples: self.max_fragment_samples,
            pacing: Duration::from_millis(self.fragment_pacing_ms),
        }
    }
}

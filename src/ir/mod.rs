pub mod parser;

pub use parser::parse_ir_file;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A named raw IR signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformDescriptor {
    pub name: String,
    pub frequency_hz: u32,
    pub duty_cycle_percent: f64,
    /// Alternating mark/space durations in microseconds
    pub samples: Vec<u32>,
}

impl WaveformDescriptor {
    fn validate(&self) -> Result<()> {
        if self.frequency_hz == 0 {
            return Err(CatalogError::InvalidWaveform {
                name: self.name.clone(),
                reason: "frequency must be positive".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.duty_cycle_percent) {
            return Err(CatalogError::InvalidWaveform {
                name: self.name.clone(),
                reason: format!("duty cycle {}% out of range", self.duty_cycle_percent),
            });
        }
        Ok(())
    }
}

/// Buttons of the physical fan remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FanSignal {
    Off,
    Low,
    Medium,
    High,
}

impl FanSignal {
    pub const ALL: [FanSignal; 4] = [FanSignal::Off, FanSignal::Low, FanSignal::Medium, FanSignal::High];

    /// Catalog key for this signal
    pub fn name(self) -> &'static str {
        match self {
            FanSignal::Off => "Fan_off",
            FanSignal::Low => "Fan_low",
            FanSignal::Medium => "Fan_med",
            FanSignal::High => "Fan_high",
        }
    }
}

impl std::fmt::Display for FanSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Required IR signal missing: {0}")]
    MissingSignal(String),

    #[error("Invalid IR signal {name}: {reason}")]
    InvalidWaveform { name: String, reason: String },

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Read-only set of waveforms, guaranteed to hold every [`FanSignal`]
#[derive(Debug, Clone)]
pub struct WaveformCatalog {
    waveforms: HashMap<String, Arc<WaveformDescriptor>>,
    fan: [Arc<WaveformDescriptor>; 4],
}

impl WaveformCatalog {
    pub fn new(waveforms: impl IntoIterator<Item = WaveformDescriptor>) -> Result<Self> {
        let mut by_name = HashMap::new();
        for waveform in waveforms {
            waveform.validate()?;
            let name = waveform.name.clone();
            if by_name.insert(name.clone(), Arc::new(waveform)).is_some() {
                log::warn!("Duplicate IR signal {}, keeping the last definition", name);
            }
        }

        let required = |signal: FanSignal| {
            by_name
                .get(signal.name())
                .cloned()
                .ok_or_else(|| CatalogError::MissingSignal(signal.name().to_string()))
        };
        let fan = [
            required(FanSignal::Off)?,
            required(FanSignal::Low)?,
            required(FanSignal::Medium)?,
            required(FanSignal::High)?,
        ];

        Ok(Self {
            waveforms: by_name,
            fan,
        })
    }

    /// Load and validate a descriptor file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_ir_text(&text)?;
        log::info!(
            "Loaded {} IR signal(s) from {}",
            catalog.len(),
            path.as_ref().display()
        );
        Ok(catalog)
    }

    pub fn from_ir_text(text: &str) -> Result<Self> {
        Self::new(parse_ir_file(text)?)
    }

    pub fn signal(&self, signal: FanSignal) -> &WaveformDescriptor {
        let index = match signal {
            FanSignal::Off => 0,
            FanSignal::Low => 1,
            FanSignal::Medium => 2,
            FanSignal::High => 3,
        };
        &self.fan[index]
    }

    pub fn get(&self, name: &str) -> Option<&WaveformDescriptor> {
        self.waveforms.get(name).map(|w| w.as_ref())
    }

    pub fn len(&self) -> usize {
        self.waveforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waveforms.is_empty()
    }
}

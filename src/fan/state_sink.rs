use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IntentState;

/// Receives the intent snapshot after every settle. Fire-and-forget.
#[async_trait::async_trait]
pub trait StateSink: Send + Sync {
    async fn store(&self, state: &IntentState);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedState {
    state: IntentState,
    saved_at: DateTime<Utc>,
}

/// Keeps the last intent in a JSON file so it survives restarts
#[derive(Debug, Clone)]
pub struct JsonFileStateSink {
    path: PathBuf,
}

impl JsonFileStateSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Last stored intent, if the file exists and is readable
    pub async fn load(&self) -> Option<IntentState> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("Failed to read state file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<PersistedState>(&text) {
            Ok(persisted) => {
                log::info!(
                    "Restored fan state {:?} saved at {}",
                    persisted.state,
                    persisted.saved_at
                );
                Some(IntentState::new(persisted.state.on, persisted.state.speed))
            }
            Err(e) => {
                log::warn!("Ignoring corrupt state file {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl StateSink for JsonFileStateSink {
    async fn store(&self, state: &IntentState) {
        let persisted = PersistedState {
            state: *state,
            saved_at: Utc::now(),
        };
        let json = match serde_json::to_string_pretty(&persisted) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize fan state: {}", e);
                return;
            }
        };

        if let Err(e) = tokio::fs::write(&self.path, json).await {
            log::error!("Failed to persist fan state to {}: {}", self.path.display(), e);
        }
    }
}

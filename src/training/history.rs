use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to write training history {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to read training history {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Malformed training history {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Per-epoch metric curves. Serialized as one JSON object mapping each
/// metric name to its ordered list, one entry per completed epoch.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub loss: Vec<f32>,
    pub accuracy: Vec<f32>,
    pub val_loss: Vec<f32>,
    pub val_accuracy: Vec<f32>,
}

impl TrainingHistory {
    pub fn push_epoch(&mut self, loss: f32, accuracy: f32, val_loss: f32, val_accuracy: f32) {
        self.loss.push(loss);
        self.accuracy.push(accuracy);
        self.val_loss.push(val_loss);
        self.val_accuracy.push(val_accuracy);
    }

    /// Number of completed epochs recorded.
    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| HistoryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| HistoryError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| HistoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| HistoryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

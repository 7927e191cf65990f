//! TOML run configuration with defaults matching the original layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureConfig;
use crate::training::FitOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Everything a training run needs: directory layout, feature parameters,
/// and fit knobs. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Root of the `<category>/<file>` dataset tree.
    pub dataset_root: PathBuf,
    pub checkpoint_dir: PathBuf,
    /// Where the artifact and label vocabulary land.
    pub model_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Skip unreadable audio files instead of aborting the build.
    pub skip_corrupt: bool,
    pub features: FeatureConfig,
    pub fit: FitSettings,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::from("ml/datasets/raw"),
            checkpoint_dir: PathBuf::from("ml/checkpoints"),
            model_dir: PathBuf::from("assets/models"),
            log_dir: PathBuf::from("ml/logs"),
            skip_corrupt: false,
            features: FeatureConfig::default(),
            fit: FitSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_fraction: f32,
    pub seed: u64,
    pub early_stopping_patience: usize,
    pub plateau_patience: usize,
    pub plateau_factor: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        let options = FitOptions::default();
        Self {
            epochs: options.epochs,
            batch_size: options.batch_size,
            learning_rate: options.learning_rate,
            validation_fraction: options.validation_fraction,
            seed: options.seed,
            early_stopping_patience: options.early_stopping_patience,
            plateau_patience: options.plateau_patience,
            plateau_factor: options.plateau_factor,
        }
    }
}

impl TrainerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.features.validate().map_err(ConfigError::Invalid)?;
        Ok(config.normalized())
    }

    /// Clamp ranges that would otherwise make the run degenerate.
    pub fn normalized(mut self) -> Self {
        self.fit.validation_fraction = self.fit.validation_fraction.clamp(0.0, 0.9);
        self.fit.plateau_factor = self.fit.plateau_factor.clamp(0.01, 1.0);
        self.fit.learning_rate = self.fit.learning_rate.max(f64::MIN_POSITIVE);
        self
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            epochs: self.fit.epochs,
            batch_size: self.fit.batch_size,
            learning_rate: self.fit.learning_rate,
            validation_fraction: self.fit.validation_fraction,
            seed: self.fit.seed,
            early_stopping_patience: self.fit.early_stopping_patience,
            plateau_patience: self.fit.plateau_patience,
            plateau_factor: self.fit.plateau_factor,
            checkpoint_dir: Some(self.checkpoint_dir.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: TrainerConfig = toml::from_str("").unwrap();
        assert_eq!(config.dataset_root, PathBuf::from("ml/datasets/raw"));
        assert_eq!(config.fit.epochs, 50);
        assert_eq!(config.fit.batch_size, 32);
        assert_eq!(config.features.n_mels, 128);
        assert!(!config.skip_corrupt);
    }

    #[test]
    fn load_reads_partial_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trainer.toml");
        std::fs::write(
            &path,
            "dataset_root = \"data/ragas\"\n\n[fit]\nepochs = 3\n\n[features]\nn_mels = 64\n",
        )
        .unwrap();
        let config = TrainerConfig::load(&path).unwrap();
        assert_eq!(config.dataset_root, PathBuf::from("data/ragas"));
        assert_eq!(config.fit.epochs, 3);
        assert_eq!(config.features.n_mels, 64);
        // Untouched settings keep their defaults.
        assert_eq!(config.fit.seed, 42);
    }

    #[test]
    fn load_rejects_invalid_features() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trainer.toml");
        std::fs::write(&path, "[features]\nhop_length = 0\n").unwrap();
        assert!(matches!(
            TrainerConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn normalized_clamps_fraction_and_factor() {
        let mut config = TrainerConfig::default();
        config.fit.validation_fraction = 2.0;
        config.fit.plateau_factor = 0.0;
        let config = config.normalized();
        assert_eq!(config.fit.validation_fraction, 0.9);
        assert_eq!(config.fit.plateau_factor, 0.01);
    }

    #[test]
    fn fit_options_carry_the_checkpoint_dir() {
        let config = TrainerConfig::default();
        let options = config.fit_options();
        assert_eq!(options.checkpoint_dir.as_deref(), Some(config.checkpoint_dir.as_path()));
        assert_eq!(options.epochs, config.fit.epochs);
    }
}

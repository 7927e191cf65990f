//! End-to-end orchestration: scan, extract, train, export.

use std::path::PathBuf;

use burn::module::AutodiffModule;
use thiserror::Error;
use tracing::info;

use crate::config::TrainerConfig;
use crate::dataset::{DatasetBuilder, DatasetError};
use crate::export::{self, ConversionError, ExportReport};
use crate::model::{CpuBackend, CpuDevice, SpectralClassifierConfig, TrainingBackend};
use crate::training::{self, HistoryError, SpectrogramBatcher, TrainError};

/// Metric curves written at the end of every run.
pub const HISTORY_FILE: &str = "training_history_cnn.json";
/// Quantized inference artifact.
pub const ARTIFACT_FILE: &str = "raga_classifier_cnn.qpk";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What a finished run produced, for logging and assertions.
#[derive(Debug)]
pub struct PipelineReport {
    pub classes: usize,
    pub examples: usize,
    pub skipped: usize,
    pub epochs_run: usize,
    pub stopped_early: bool,
    pub best_val_accuracy: f32,
    pub history_path: PathBuf,
    pub export: ExportReport,
}

/// Create the directory layout a run writes into.
pub fn ensure_output_dirs(config: &TrainerConfig) -> Result<(), PipelineError> {
    for dir in [
        &config.dataset_root,
        &config.checkpoint_dir,
        &config.model_dir,
        &config.log_dir,
    ] {
        std::fs::create_dir_all(dir).map_err(|source| PipelineError::CreateDir {
            path: dir.clone(),
            source,
        })?;
    }
    Ok(())
}

/// Run the whole pipeline: build the dataset, train the convolutional
/// classifier, persist history, and export the quantized artifact.
pub fn run(config: &TrainerConfig) -> Result<PipelineReport, PipelineError> {
    ensure_output_dirs(config)?;

    let builder = DatasetBuilder::new(config.features.clone())
        .skip_corrupt(config.skip_corrupt)
        .persist_vocabulary(config.model_dir.join(export::LABELS_FILE));
    let (dataset, stats) = builder.build(&config.dataset_root)?;

    let device = CpuDevice::default();
    let model = SpectralClassifierConfig::new(dataset.vocabulary.len())
        .init::<TrainingBackend>(&device);
    let options = config.fit_options();
    let outcome = training::fit(model, &dataset, &SpectrogramBatcher, &options, &device)?;

    let history_path = config.log_dir.join(HISTORY_FILE);
    outcome.history.save(&history_path)?;

    let artifact_path = config.model_dir.join(ARTIFACT_FILE);
    let export = export::export_quantized::<CpuBackend, _>(
        &outcome.model.valid(),
        &dataset.vocabulary,
        &artifact_path,
    )?;

    let report = PipelineReport {
        classes: dataset.vocabulary.len(),
        examples: stats.examples,
        skipped: stats.skipped,
        epochs_run: outcome.history.epochs(),
        stopped_early: outcome.stopped_early,
        best_val_accuracy: outcome.best_val_accuracy,
        history_path,
        export,
    };
    info!(
        classes = report.classes,
        examples = report.examples,
        epochs = report.epochs_run,
        stopped_early = report.stopped_early,
        best_val_accuracy = report.best_val_accuracy,
        artifact = %report.export.artifact_path.display(),
        "pipeline complete"
    );
    Ok(report)
}

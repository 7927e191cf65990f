//! Training loop, schedule policies, and checkpointing.

mod checkpoint;
mod history;
mod policies;

use std::path::PathBuf;

use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor, TensorData};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, info};

use crate::dataset::{Example, LabeledDataset};
use crate::model::{Classifier, CpuBackend, CpuDevice, TrainingBackend};

pub use checkpoint::CheckpointWriter;
pub use history::{HistoryError, TrainingHistory};
pub use policies::{EarlyStopping, PlateauDecay};

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Checkpoint failure at {path}: {reason}")]
    Checkpoint { path: PathBuf, reason: String },
}

/// Rejected before any training work starts.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Cannot train on an empty dataset")]
    EmptyDataset,
    #[error("Training needs at least two categories, got {0}")]
    TooFewCategories(usize),
    #[error("Batch size must be positive")]
    ZeroBatchSize,
}

/// Knobs for one training run.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_fraction: f32,
    pub seed: u64,
    pub early_stopping_patience: usize,
    pub plateau_patience: usize,
    pub plateau_factor: f64,
    /// When set, an improving epoch writes a weight snapshot here.
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            learning_rate: 1e-3,
            validation_fraction: 0.2,
            seed: 42,
            early_stopping_patience: 10,
            plateau_patience: 5,
            plateau_factor: 0.5,
            checkpoint_dir: None,
        }
    }
}

/// Assembles a model input plus integer targets from borrowed examples.
pub trait ExampleBatcher<B: Backend> {
    type Input;

    fn batch(&self, examples: &[&Example], device: &B::Device)
    -> (Self::Input, Tensor<B, 1, Int>);
}

/// Stacks log-mel tensors into `[batch, 1, mels, frames]`.
pub struct SpectrogramBatcher;

impl<B: Backend> ExampleBatcher<B> for SpectrogramBatcher {
    type Input = Tensor<B, 4>;

    fn batch(
        &self,
        examples: &[&Example],
        device: &B::Device,
    ) -> (Tensor<B, 4>, Tensor<B, 1, Int>) {
        let n = examples.len();
        let (mels, frames) = examples
            .first()
            .map(|example| example.features.dim())
            .unwrap_or((0, 0));
        let mut flat = Vec::with_capacity(n * mels * frames);
        for example in examples {
            flat.extend(example.features.iter().copied());
        }
        let input = Tensor::from_data(TensorData::new(flat, [n, 1, mels, frames]), device);
        let labels: Vec<i64> = examples.iter().map(|example| example.label as i64).collect();
        let targets = Tensor::from_data(TensorData::new(labels, [n]), device);
        (input, targets)
    }
}

/// Result of a completed run. `model` holds the weights of the best
/// validation epoch, not the last one.
#[derive(Debug)]
pub struct FitOutcome<M> {
    pub model: M,
    pub history: TrainingHistory,
    pub stopped_early: bool,
    pub best_val_accuracy: f32,
    pub checkpoints: Vec<PathBuf>,
}

/// Train `model` on `dataset` with Adam and cross-entropy on logits.
///
/// Validation metrics drive all three policies (early stop, plateau decay,
/// checkpointing) and are computed on the non-autodiff module so dropout is
/// off and batch norm uses running statistics.
pub fn fit<M, Bt>(
    model: M,
    dataset: &LabeledDataset,
    batcher: &Bt,
    options: &FitOptions,
    device: &CpuDevice,
) -> Result<FitOutcome<M>, TrainError>
where
    M: Classifier<TrainingBackend> + AutodiffModule<TrainingBackend>,
    M::InnerModule: Classifier<CpuBackend>,
    Bt: ExampleBatcher<TrainingBackend, Input = <M as Classifier<TrainingBackend>>::Input>
        + ExampleBatcher<CpuBackend, Input = <M::InnerModule as Classifier<CpuBackend>>::Input>,
{
    if dataset.is_empty() {
        return Err(ConfigurationError::EmptyDataset.into());
    }
    let classes = dataset.vocabulary.len();
    if classes < 2 {
        return Err(ConfigurationError::TooFewCategories(classes).into());
    }
    if options.batch_size == 0 {
        return Err(ConfigurationError::ZeroBatchSize.into());
    }

    let (train_indices, val_indices) =
        dataset.split_indices(options.validation_fraction, options.seed);
    // A one-example dataset has nothing to hold out; validate on what exists.
    let eval_indices: &[usize] = if val_indices.is_empty() {
        &train_indices
    } else {
        &val_indices
    };
    info!(
        examples = dataset.len(),
        train = train_indices.len(),
        validation = val_indices.len(),
        classes,
        epochs = options.epochs,
        "starting training run"
    );

    let checkpoints = match &options.checkpoint_dir {
        Some(dir) => Some(CheckpointWriter::new(dir)?),
        None => None,
    };
    let mut optim = AdamConfig::new().init::<TrainingBackend, M>();
    let loss_fn = CrossEntropyLossConfig::new().init::<TrainingBackend>(device);
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut early = EarlyStopping::new(options.early_stopping_patience);
    let mut plateau = PlateauDecay::new(options.plateau_patience, options.plateau_factor);
    let mut learning_rate = options.learning_rate;
    let mut history = TrainingHistory::default();
    let mut written = Vec::new();

    let mut model = model;
    let mut best_model = model.clone();
    let mut stopped_early = false;
    let mut train_order = train_indices.clone();

    for epoch in 1..=options.epochs {
        train_order.shuffle(&mut rng);
        let mut epoch_loss = 0.0_f64;
        let mut correct = 0_i64;
        let mut seen = 0_usize;
        for chunk in train_order.chunks(options.batch_size) {
            let examples: Vec<&Example> =
                chunk.iter().map(|&idx| &dataset.examples[idx]).collect();
            let (input, targets) =
                ExampleBatcher::<TrainingBackend>::batch(batcher, &examples, device);
            let logits = model.forward(input);
            let loss = loss_fn.forward(logits.clone(), targets.clone());
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            let loss_value: f32 = loss.into_scalar().elem();
            model = optim.step(learning_rate, model, grads);
            epoch_loss += loss_value as f64 * examples.len() as f64;
            correct += batch_correct(logits, targets);
            seen += examples.len();
        }
        let train_loss = (epoch_loss / seen.max(1) as f64) as f32;
        let train_accuracy = correct as f32 / seen.max(1) as f32;

        let eval_model = model.valid();
        let (val_loss, val_accuracy) = evaluate(
            &eval_model,
            dataset,
            eval_indices,
            batcher,
            options.batch_size,
            device,
        );
        history.push_epoch(train_loss, train_accuracy, val_loss, val_accuracy);
        info!(
            epoch,
            loss = train_loss,
            accuracy = train_accuracy,
            val_loss,
            val_accuracy,
            lr = learning_rate,
            "epoch complete"
        );

        if early.observe(val_accuracy) {
            best_model = model.clone();
            if let Some(writer) = &checkpoints {
                written.push(writer.write::<CpuBackend, _>(model.valid(), epoch)?);
            }
        }
        learning_rate = plateau.observe(val_accuracy, learning_rate);
        if early.should_stop() {
            info!(epoch, best_val_accuracy = early.best(), "early stop");
            stopped_early = true;
            break;
        }
    }

    Ok(FitOutcome {
        model: best_model,
        history,
        stopped_early,
        best_val_accuracy: early.best(),
        checkpoints: written,
    })
}

fn evaluate<EM, Bt>(
    model: &EM,
    dataset: &LabeledDataset,
    indices: &[usize],
    batcher: &Bt,
    batch_size: usize,
    device: &CpuDevice,
) -> (f32, f32)
where
    EM: Classifier<CpuBackend>,
    Bt: ExampleBatcher<CpuBackend, Input = EM::Input>,
{
    let loss_fn = CrossEntropyLossConfig::new().init::<CpuBackend>(device);
    let mut total_loss = 0.0_f64;
    let mut correct = 0_i64;
    let mut seen = 0_usize;
    for chunk in indices.chunks(batch_size.max(1)) {
        let examples: Vec<&Example> = chunk.iter().map(|&idx| &dataset.examples[idx]).collect();
        let (input, targets) = ExampleBatcher::<CpuBackend>::batch(batcher, &examples, device);
        let logits = model.forward(input);
        let loss = loss_fn.forward(logits.clone(), targets.clone());
        let loss_value: f32 = loss.into_scalar().elem();
        total_loss += loss_value as f64 * examples.len() as f64;
        correct += batch_correct(logits, targets);
        seen += examples.len();
    }
    debug!(examples = seen, "validation pass complete");
    (
        (total_loss / seen.max(1) as f64) as f32,
        correct as f32 / seen.max(1) as f32,
    )
}

fn batch_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> i64 {
    let n = logits.dims()[0];
    let predicted: Tensor<B, 1, Int> = logits.argmax(1).reshape([n]);
    predicted
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LabelVocabulary;
    use crate::model::SpectralClassifierConfig;
    use ndarray::Array2;
    use tempfile::TempDir;

    fn synthetic_dataset(examples_per_class: usize) -> LabeledDataset {
        let vocabulary = LabelVocabulary::from_names(vec!["low".into(), "high".into()]);
        let mut examples = Vec::new();
        for label in 0..2 {
            for i in 0..examples_per_class {
                let fill = if label == 0 { -1.0 } else { 1.0 };
                let mut features = Array2::from_elem((4, 6), fill);
                features[[0, 0]] = i as f32 * 0.01;
                examples.push(Example {
                    features,
                    one_hot: vocabulary.one_hot(label),
                    label,
                });
            }
        }
        LabeledDataset {
            examples,
            vocabulary,
        }
    }

    #[test]
    fn fit_rejects_empty_dataset() {
        let dataset = LabeledDataset {
            examples: Vec::new(),
            vocabulary: LabelVocabulary::from_names(vec!["a".into(), "b".into()]),
        };
        let device = CpuDevice::default();
        let model = SpectralClassifierConfig::new(2).init::<TrainingBackend>(&device);
        let err = fit(
            model,
            &dataset,
            &SpectrogramBatcher,
            &FitOptions::default(),
            &device,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TrainError::Configuration(ConfigurationError::EmptyDataset)
        ));
    }

    #[test]
    fn fit_rejects_single_category() {
        let mut dataset = synthetic_dataset(2);
        dataset.vocabulary = LabelVocabulary::from_names(vec!["only".into()]);
        let device = CpuDevice::default();
        let model = SpectralClassifierConfig::new(1).init::<TrainingBackend>(&device);
        let err = fit(
            model,
            &dataset,
            &SpectrogramBatcher,
            &FitOptions::default(),
            &device,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TrainError::Configuration(ConfigurationError::TooFewCategories(1))
        ));
    }

    #[test]
    fn fit_rejects_zero_batch_size() {
        let dataset = synthetic_dataset(2);
        let device = CpuDevice::default();
        let model = SpectralClassifierConfig::new(2).init::<TrainingBackend>(&device);
        let options = FitOptions {
            batch_size: 0,
            ..FitOptions::default()
        };
        let err = fit(model, &dataset, &SpectrogramBatcher, &options, &device).unwrap_err();
        assert!(matches!(
            err,
            TrainError::Configuration(ConfigurationError::ZeroBatchSize)
        ));
    }

    #[test]
    fn fit_records_history_and_checkpoints() {
        let dir = TempDir::new().unwrap();
        let dataset = synthetic_dataset(4);
        let device = CpuDevice::default();
        let model = SpectralClassifierConfig::new(2).init::<TrainingBackend>(&device);
        let options = FitOptions {
            epochs: 2,
            batch_size: 4,
            checkpoint_dir: Some(dir.path().to_path_buf()),
            ..FitOptions::default()
        };
        let outcome = fit(model, &dataset, &SpectrogramBatcher, &options, &device).unwrap();
        assert_eq!(outcome.history.epochs(), 2);
        // The first epoch always improves on negative infinity.
        assert!(!outcome.checkpoints.is_empty());
        assert!(outcome.checkpoints[0].file_name().is_some());
        assert!(outcome.best_val_accuracy >= 0.0);
        assert_eq!(outcome.model.num_classes(), 2);
    }

    #[test]
    fn fit_stops_early_on_a_plateau_and_returns_the_best_snapshot() {
        let dataset = synthetic_dataset(5);
        let device = CpuDevice::default();
        let model = SpectralClassifierConfig::new(2).init::<TrainingBackend>(&device);
        // Validation holds two examples, so accuracy can only take three
        // values and can strictly improve at most twice; with a short
        // patience the run must stall out long before the budget.
        let options = FitOptions {
            epochs: 20,
            batch_size: 4,
            early_stopping_patience: 2,
            ..FitOptions::default()
        };
        let outcome = fit(model, &dataset, &SpectrogramBatcher, &options, &device).unwrap();
        assert!(outcome.stopped_early);
        assert!(outcome.history.epochs() < options.epochs);
        let best_in_curve = outcome
            .history
            .val_accuracy
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(outcome.best_val_accuracy, best_in_curve);
    }

    #[test]
    fn spectrogram_batcher_stacks_examples() {
        let dataset = synthetic_dataset(2);
        let device = CpuDevice::default();
        let refs: Vec<&Example> = dataset.examples.iter().collect();
        let (input, targets) =
            ExampleBatcher::<CpuBackend>::batch(&SpectrogramBatcher, &refs, &device);
        assert_eq!(input.dims(), [4, 1, 4, 6]);
        assert_eq!(targets.dims(), [4]);
        let labels: Vec<i64> = targets.into_data().to_vec().unwrap();
        assert_eq!(labels, vec![0, 0, 1, 1]);
    }
}

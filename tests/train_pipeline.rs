mod support;

use std::path::Path;

use raga_trainer::config::TrainerConfig;
use raga_trainer::dataset::{DatasetError, LabelVocabulary};
use raga_trainer::features::{FeatureConfig, FeatureExtractor};
use raga_trainer::pipeline::{self, ARTIFACT_FILE, HISTORY_FILE, PipelineError};
use raga_trainer::training::{ConfigurationError, TrainError, TrainingHistory};
use support::wav::{sine_tone, write_test_wav};
use tempfile::TempDir;

const TEST_SAMPLE_RATE: u32 = 4_000;

fn small_features() -> FeatureConfig {
    FeatureConfig {
        sample_rate: TEST_SAMPLE_RATE,
        duration_seconds: 2.0,
        n_fft: 256,
        hop_length: 128,
        n_mels: 16,
    }
}

fn test_config(root: &Path) -> TrainerConfig {
    let mut config = TrainerConfig {
        dataset_root: root.join("raw"),
        checkpoint_dir: root.join("checkpoints"),
        model_dir: root.join("models"),
        log_dir: root.join("logs"),
        skip_corrupt: false,
        features: small_features(),
        ..TrainerConfig::default()
    };
    config.fit.epochs = 3;
    config.fit.batch_size = 4;
    config
}

fn write_category(root: &Path, name: &str, freq: f32, files: usize) {
    for idx in 0..files {
        let path = root.join(name).join(format!("clip{idx}.wav"));
        write_test_wav(&path, TEST_SAMPLE_RATE, &sine_tone(freq, TEST_SAMPLE_RATE, 2.0));
    }
}

#[test]
fn full_run_produces_vocabulary_history_and_artifact() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_category(&config.dataset_root, "Yaman", 440.0, 5);
    write_category(&config.dataset_root, "Bhairavi", 220.0, 5);

    let report = pipeline::run(&config).unwrap();
    assert_eq!(report.classes, 2);
    assert_eq!(report.examples, 10);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.epochs_run, 3);

    // Vocabulary is sorted category names.
    let vocab = LabelVocabulary::load(&config.model_dir.join("raga_names.json")).unwrap();
    assert_eq!(vocab.names(), ["Bhairavi", "Yaman"]);

    let history = TrainingHistory::load(&config.log_dir.join(HISTORY_FILE)).unwrap();
    assert_eq!(history.loss.len(), 3);
    assert_eq!(history.accuracy.len(), 3);
    assert_eq!(history.val_loss.len(), 3);
    assert_eq!(history.val_accuracy.len(), 3);

    let artifact = config.model_dir.join(ARTIFACT_FILE);
    assert!(artifact.is_file());
    assert!(report.export.artifact_bytes > 0);
    assert!(report.export.artifact_bytes < report.export.raw_weight_bytes);

    // The first epoch always improves, so at least one checkpoint exists.
    let checkpoints = std::fs::read_dir(&config.checkpoint_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .count();
    assert!(checkpoints >= 1);
}

#[test]
fn rescan_of_static_tree_yields_identical_vocabulary() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_category(&config.dataset_root, "Todi", 330.0, 2);
    write_category(&config.dataset_root, "Asavari", 550.0, 2);

    pipeline::run(&config).unwrap();
    let first = std::fs::read(config.model_dir.join("raga_names.json")).unwrap();
    pipeline::run(&config).unwrap();
    let second = std::fs::read(config.model_dir.join("raga_names.json")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn corrupt_file_aborts_by_default() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_category(&config.dataset_root, "Yaman", 440.0, 2);
    write_category(&config.dataset_root, "Bhairavi", 220.0, 2);
    std::fs::write(config.dataset_root.join("Yaman").join("broken.wav"), b"junk").unwrap();

    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Dataset(DatasetError::Decode(_))
    ));
}

#[test]
fn skip_corrupt_counts_the_skip_and_trains_on_the_rest() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.skip_corrupt = true;
    write_category(&config.dataset_root, "Yaman", 440.0, 3);
    write_category(&config.dataset_root, "Bhairavi", 220.0, 3);
    std::fs::write(config.dataset_root.join("Yaman").join("broken.wav"), b"junk").unwrap();

    let report = pipeline::run(&config).unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.examples, 6);
}

#[test]
fn empty_dataset_root_fails_fast() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Dataset(DatasetError::NoCategories { .. })
    ));
}

#[test]
fn single_category_fails_before_training() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_category(&config.dataset_root, "Yaman", 440.0, 4);

    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Train(TrainError::Configuration(
            ConfigurationError::TooFewCategories(1)
        ))
    ));
}

#[test]
fn default_feature_config_yields_documented_shape() {
    let config = FeatureConfig::default();
    let expected = (config.n_mels, config.frame_count());
    assert_eq!(expected, (128, 2_584));

    let mut extractor = FeatureExtractor::new(config);
    let samples = sine_tone(440.0, 44_100, 1.0);
    let features = extractor.extract_from_samples(&samples);
    assert_eq!(features.dim(), expected);
}

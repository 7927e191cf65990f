//! Library exports for reuse in benchmarks and tests.
/// Audio decoding and waveform preparation.
pub mod audio;
/// Run configuration loading.
pub mod config;
/// Dataset scanning and labeled example collection.
pub mod dataset;
/// Quantized artifact export.
pub mod export;
/// Mel-spectrogram feature extraction.
pub mod features;
/// Tracing subscriber setup.
pub mod logging;
/// Classifier architectures.
pub mod model;
/// End-to-end training pipeline.
pub mod pipeline;
/// Training loop and schedule policies.
pub mod training;

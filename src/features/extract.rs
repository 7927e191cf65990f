use std::path::Path;

use ndarray::Array2;

use crate::audio::{self, DecodeError};

use super::{FeatureConfig, MelBank, SpectrogramPlan};

const DB_AMIN: f32 = 1e-10;
const DB_TOP: f32 = 80.0;
const ZSCORE_STD_FLOOR: f32 = 1e-6;

/// Turns an audio file into a normalized log-mel tensor of fixed shape
/// `(n_mels, frame_count)`. Holds the FFT plan and filterbank so repeated
/// extraction reuses its buffers.
pub struct FeatureExtractor {
    config: FeatureConfig,
    plan: SpectrogramPlan,
    bank: MelBank,
    clip: Vec<f32>,
    power: Vec<f32>,
    mel: Vec<f32>,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        let plan = SpectrogramPlan::new(config.n_fft, config.hop_length);
        let bank = MelBank::new(config.sample_rate, config.n_fft, config.n_mels);
        let frames = config.frame_count();
        let bins = plan.bins();
        Self {
            config,
            plan,
            bank,
            clip: Vec::new(),
            power: vec![0.0; frames * bins],
            mel: Vec::new(),
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Decode, trim, and featurize a single file.
    pub fn extract(&mut self, path: &Path) -> Result<Array2<f32>, DecodeError> {
        let max_seconds = self.config.max_decode_seconds();
        let wave = audio::load_mono(path, self.config.sample_rate, Some(max_seconds))?;
        Ok(self.extract_from_samples(&wave.samples))
    }

    /// Featurize mono samples already at the analysis rate. Always returns
    /// the same shape regardless of input length.
    pub fn extract_from_samples(&mut self, samples: &[f32]) -> Array2<f32> {
        let trimmed = audio::trim_silence(samples, self.config.sample_rate);
        self.clip.clear();
        self.clip.extend_from_slice(&trimmed);
        audio::force_clip_length(&mut self.clip, self.config.clip_samples());

        let frames = self.config.frame_count();
        let bins = self.plan.bins();
        let n_mels = self.config.n_mels;
        self.power.resize(frames * bins, 0.0);
        self.power.fill(0.0);
        let written = self.plan.power_frames_into(&self.clip, &mut self.power);
        debug_assert_eq!(written, frames);

        let mut features = Array2::<f32>::zeros((n_mels, frames));
        self.mel.resize(n_mels, 0.0);
        for frame in 0..frames {
            let spectrum = &self.power[frame * bins..(frame + 1) * bins];
            self.bank.mel_from_power_into(spectrum, &mut self.mel);
            for (band, &value) in self.mel.iter().enumerate() {
                features[[band, frame]] = value;
            }
        }

        power_to_db_in_place(&mut features);
        zscore_in_place(&mut features);
        features
    }
}

/// Convert power values to decibels referenced to the tensor's own peak,
/// with everything more than `DB_TOP` below the peak clamped to the floor.
fn power_to_db_in_place(features: &mut Array2<f32>) {
    let reference = features
        .iter()
        .copied()
        .fold(DB_AMIN, f32::max)
        .max(DB_AMIN);
    let ref_db = 10.0 * reference.log10();
    let floor = -DB_TOP;
    for value in features.iter_mut() {
        let db = 10.0 * value.max(DB_AMIN).log10() - ref_db;
        *value = db.max(floor);
    }
}

/// Z-score over the whole tensor, not per band.
fn zscore_in_place(features: &mut Array2<f32>) {
    let n = features.len();
    if n == 0 {
        return;
    }
    let mean = features.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let var = features
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;
    let std = (var.sqrt() as f32).max(ZSCORE_STD_FLOOR);
    let mean = mean as f32;
    for value in features.iter_mut() {
        *value = (*value - mean) / std;
    }
}

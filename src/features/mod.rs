//! Mel-spectrogram feature extraction with a fixed output shape.

mod extract;
mod mel;
mod stft;

use serde::{Deserialize, Serialize};

pub use extract::FeatureExtractor;
pub(crate) use mel::MelBank;
pub(crate) use stft::SpectrogramPlan;

/// Spectral analysis parameters. Every component receives this explicitly;
/// the defaults match the training corpus the pipeline was tuned on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Analysis sample rate the waveform is resampled to.
    pub sample_rate: u32,
    /// Fixed clip length in seconds; shorter clips are zero-padded.
    pub duration_seconds: f32,
    /// FFT window length in samples.
    pub n_fft: usize,
    /// Hop between successive analysis frames in samples.
    pub hop_length: usize,
    /// Number of mel bands in the output tensor.
    pub n_mels: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            duration_seconds: 30.0,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
        }
    }
}

impl FeatureConfig {
    /// Number of samples in the fixed-length clip.
    pub fn clip_samples(&self) -> usize {
        (self.sample_rate as f64 * self.duration_seconds as f64)
            .round()
            .max(1.0) as usize
    }

    /// Frames produced by the hop loop over a full clip. Constant for a
    /// given config, so every extracted tensor has the same width.
    pub fn frame_count(&self) -> usize {
        self.clip_samples().div_ceil(self.hop_length.max(1))
    }

    /// Decode budget handed to the audio loader. A little slack past the
    /// clip keeps the silence trim from eating into usable audio.
    pub(crate) fn max_decode_seconds(&self) -> f32 {
        self.duration_seconds + 60.0
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample_rate must be positive".to_string());
        }
        if !(self.duration_seconds > 0.0) {
            return Err("duration_seconds must be positive".to_string());
        }
        if self.n_fft < 16 {
            return Err("n_fft must be at least 16".to_string());
        }
        if self.hop_length == 0 {
            return Err("hop_length must be positive".to_string());
        }
        if self.n_mels == 0 {
            return Err("n_mels must be positive".to_string());
        }
        if self.n_mels > self.n_fft / 2 + 1 {
            return Err("n_mels exceeds the number of spectrum bins".to_string());
        }
        Ok(())
    }
}

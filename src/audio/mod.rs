//! Audio decoding and waveform preparation for feature extraction.

mod decode;
mod prep;
mod resample;
mod silence;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub(crate) const SILENCE_THRESHOLD_ON_DB: f32 = -45.0;
pub(crate) const SILENCE_THRESHOLD_OFF_DB: f32 = -55.0;
pub(crate) const SILENCE_PRE_ROLL_SECONDS: f32 = 0.01;
pub(crate) const SILENCE_POST_ROLL_SECONDS: f32 = 0.005;

pub(crate) use prep::{downmix_to_mono_into, force_clip_length};
pub(crate) use resample::resample_linear_into;
pub(crate) use silence::trim_silence;

/// Errors raised while decoding an audio file into samples.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file could not be opened at all.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The container or codec could not be read.
    #[error("Unsupported or corrupt audio in {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    /// Decoding succeeded but produced no samples.
    #[error("No audio samples decoded from {path}")]
    Empty { path: PathBuf },
}

/// Raw decoded audio in interleaved `f32` samples.
pub(crate) struct DecodedAudio {
    pub(crate) samples: Vec<f32>,
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
}

/// Mono waveform resampled to a fixed analysis rate.
#[derive(Debug)]
pub struct Waveform {
    /// Mono samples in `[-1, 1]`.
    pub samples: Vec<f32>,
    /// Sample rate the waveform was resampled to.
    pub sample_rate: u32,
}

/// Decode `path`, downmix to mono, and linearly resample to `target_rate`.
///
/// `max_seconds` bounds how much audio is decoded; `None` decodes the whole
/// file.
pub fn load_mono(
    path: &Path,
    target_rate: u32,
    max_seconds: Option<f32>,
) -> Result<Waveform, DecodeError> {
    let decoded = decode::decode_audio(path, max_seconds)?;
    let mut mono = Vec::new();
    downmix_to_mono_into(&mut mono, &decoded.samples, decoded.channels);
    let mut resampled = Vec::new();
    resample_linear_into(&mut resampled, &mono, decoded.sample_rate, target_rate);
    Ok(Waveform {
        samples: resampled,
        sample_rate: target_rate,
    })
}

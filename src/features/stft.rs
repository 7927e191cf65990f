use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Reusable STFT state: planned FFT, Hann window, and scratch buffers.
/// One plan is built per extractor and reused across every clip.
pub(crate) struct SpectrogramPlan {
    n_fft: usize,
    hop: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrogramPlan {
    pub(crate) fn new(n_fft: usize, hop: usize) -> Self {
        let n_fft = n_fft.max(16);
        let hop = hop.max(1);
        let fft = FftPlanner::new().plan_fft_forward(n_fft);
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            n_fft,
            hop,
            fft,
            window: hann_window(n_fft),
            buf: vec![Complex::default(); n_fft],
            scratch: vec![Complex::default(); scratch_len],
        }
    }

    pub(crate) fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames the hop loop yields for `sample_len` samples.
    pub(crate) fn frame_count(&self, sample_len: usize) -> usize {
        sample_len.max(1).div_ceil(self.hop)
    }

    /// Compute power spectra (0..=Nyquist) for every hop position, writing
    /// each frame's bins into `out` row-major. `out` must hold at least
    /// `frame_count(samples.len()) * bins()` values.
    pub(crate) fn power_frames_into(&mut self, samples: &[f32], out: &mut [f32]) -> usize {
        let bins = self.bins();
        let frames = self.frame_count(samples.len());
        debug_assert!(out.len() >= frames * bins);
        if samples.is_empty() {
            out[..bins].fill(0.0);
            return 1;
        }
        let mut start = 0usize;
        let mut frame_idx = 0usize;
        while start < samples.len() && frame_idx < frames {
            for (i, cell) in self.buf.iter_mut().enumerate() {
                let src = samples.get(start + i).copied().unwrap_or(0.0);
                *cell = Complex::new(src * self.window[i], 0.0);
            }
            self.fft
                .process_with_scratch(&mut self.buf, &mut self.scratch);
            let offset = frame_idx * bins;
            for (bin, slot) in out[offset..offset + bins].iter_mut().enumerate() {
                let c = self.buf[bin];
                *slot = (c.re * c.re + c.im * c.im).max(0.0);
            }
            start = start.saturating_add(self.hop);
            frame_idx += 1;
        }
        frame_idx
    }
}

fn hann_window(len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len.max(1)];
    }
    (0..len)
        .map(|i| {
            let phase = std::f32::consts::TAU * i as f32 / len as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_frames_cover_input_with_zero_padded_tail() {
        let mut plan = SpectrogramPlan::new(256, 128);
        let samples = vec![0.5_f32; 1000];
        let frames = plan.frame_count(samples.len());
        assert_eq!(frames, 8);
        let mut out = vec![0.0_f32; frames * plan.bins()];
        let written = plan.power_frames_into(&samples, &mut out);
        assert_eq!(written, frames);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn pure_tone_concentrates_power_near_its_bin() {
        let n_fft = 512;
        let sample_rate = 8_000.0_f32;
        let freq = 1_000.0_f32;
        let mut plan = SpectrogramPlan::new(n_fft, n_fft);
        let samples: Vec<f32> = (0..n_fft)
            .map(|i| (std::f32::consts::TAU * freq * i as f32 / sample_rate).sin())
            .collect();
        let mut out = vec![0.0_f32; plan.bins()];
        plan.power_frames_into(&samples, &mut out);
        let peak_bin = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let expected = (freq / sample_rate * n_fft as f32).round() as usize;
        assert!((peak_bin as i64 - expected as i64).abs() <= 1);
    }

    #[test]
    fn hann_window_endpoints_are_zero() {
        let window = hann_window(256);
        assert!(window[0].abs() < 1e-6);
        assert!(window.iter().all(|&w| (0.0..=1.0).contains(&w)));
    }
}

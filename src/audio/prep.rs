pub(crate) fn downmix_to_mono_into(out: &mut Vec<f32>, samples: &[f32], channels: u16) {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        out.clear();
        out.reserve(samples.len().saturating_sub(out.capacity()));
        for sample in samples.iter().copied() {
            out.push(sanitize_sample(sample));
        }
        return;
    }
    let frames = samples.len() / channels;
    out.clear();
    out.reserve(frames.saturating_sub(out.capacity()));
    for frame in 0..frames {
        let start = frame * channels;
        let end = start + channels;
        let slice = &samples[start..end.min(samples.len())];
        let mut sum = 0.0_f32;
        for &sample in slice {
            sum += sanitize_sample(sample);
        }
        out.push(sum / channels as f32);
    }
}

/// Truncate or zero-pad so the clip holds exactly `clip_samples` samples.
pub(crate) fn force_clip_length(samples: &mut Vec<f32>, clip_samples: usize) {
    if samples.len() > clip_samples {
        samples.truncate(clip_samples);
    } else {
        samples.resize(clip_samples, 0.0);
    }
}

pub(crate) fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum = samples.iter().fold(0.0_f64, |acc, &s| {
        let s = sanitize_sample(s) as f64;
        acc + s * s
    });
    let mean = sum / samples.len() as f64;
    (mean.max(0.0).sqrt() as f32).min(1.0)
}

pub(crate) fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

fn sanitize_sample(sample: f32) -> f32 {
    if !sample.is_finite() {
        return 0.0;
    }
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped != 0.0 && clamped.abs() < f32::MIN_POSITIVE {
        0.0
    } else {
        clamped
    }
}

use super::prep::{db_to_linear, rms};
use super::{
    SILENCE_POST_ROLL_SECONDS, SILENCE_PRE_ROLL_SECONDS, SILENCE_THRESHOLD_OFF_DB,
    SILENCE_THRESHOLD_ON_DB,
};

/// Strip leading and trailing near-silence with an RMS hysteresis gate.
///
/// Activation requires the on threshold; once active, the region stays open
/// until RMS drops below the lower off threshold. A short pre/post roll is
/// kept around the active region so onsets are not clipped.
pub(crate) fn trim_silence(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    if samples.is_empty() || sample_rate == 0 {
        return samples.to_vec();
    }
    let window_size = (sample_rate as f32 * 0.02).round().max(1.0) as usize; // 20ms
    let hop = window_size;
    if samples.len() <= window_size {
        return samples.to_vec();
    }

    let threshold_on = db_to_linear(SILENCE_THRESHOLD_ON_DB);
    let threshold_off = db_to_linear(SILENCE_THRESHOLD_OFF_DB);
    let pre_roll = (sample_rate as f32 * SILENCE_PRE_ROLL_SECONDS)
        .round()
        .max(0.0) as usize;
    let post_roll = (sample_rate as f32 * SILENCE_POST_ROLL_SECONDS)
        .round()
        .max(0.0) as usize;

    let mut active_start: Option<usize> = None;
    let mut active_end: Option<usize> = None;

    let mut active = false;
    let mut window_start = 0usize;
    while window_start < samples.len() {
        let window_end = (window_start + window_size).min(samples.len());
        let rms_value = rms(&samples[window_start..window_end]);
        if !active {
            if rms_value >= threshold_on {
                active = true;
                // Only leading and trailing silence are trimmed; a later
                // burst must not move the start past an earlier one.
                active_start.get_or_insert(window_start);
                active_end = Some(window_end);
            }
        } else if rms_value >= threshold_off {
            active_end = Some(window_end);
        } else {
            active = false;
        }
        window_start = window_start.saturating_add(hop);
    }

    let Some(active_start) = active_start else {
        // All-silence input is returned untouched; padding happens later.
        return samples.to_vec();
    };
    let Some(active_end) = active_end else {
        return samples.to_vec();
    };

    let trimmed_start = active_start.saturating_sub(pre_roll).min(samples.len());
    let trimmed_end = (active_end + post_roll)
        .max(trimmed_start.saturating_add(1))
        .min(samples.len());
    samples[trimmed_start..trimmed_end].to_vec()
}

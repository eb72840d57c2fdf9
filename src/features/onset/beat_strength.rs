//! Beat-strength curve from low mel bands
//!
//! Kick drums and bass carry most of the pulse in popular music, so the beat-strength
//! curve is a log-compressed spectral flux restricted to mel bands below a cutoff,
//! smoothed with a short moving average to merge split attacks.

use crate::error::AnalysisError;
use crate::features::mel::MelConversionConfig;
use crate::features::{ContinuousSignal, Spectrogram2D};

/// Gain inside `ln(1 + gamma * x)` log compression
const LOG_COMPRESSION_GAMMA: f64 = 100.0;

/// Compute the beat-strength curve
///
/// # Arguments
///
/// * `mel_spectrogram` - Mel spectrogram laid out by `mel`
/// * `mel` - Mel layout of the spectrogram rows
/// * `max_hz` - Highest band center included (at least one band is always used)
/// * `smoothing_frames` - Moving-average window (0 or 1 disables smoothing)
///
/// # Returns
///
/// Curve with `n_frames - 1` values stamped with frames `1..n`
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if the spectrogram rows do not match `mel`
pub fn beat_strength(
    mel_spectrogram: &Spectrogram2D,
    mel: &MelConversionConfig,
    max_hz: f64,
    smoothing_frames: usize,
) -> Result<ContinuousSignal, AnalysisError> {
    let frames = &mel_spectrogram.frames;
    if frames.len() < 2 {
        return Ok(ContinuousSignal::empty());
    }
    if let Some(frame) = frames.iter().find(|f| f.len() != mel.n_mels()) {
        return Err(AnalysisError::InvalidInput(format!(
            "Mel spectrogram has {} bands per frame, layout expects {}",
            frame.len(),
            mel.n_mels()
        )));
    }

    let band_count = (0..mel.n_mels())
        .take_while(|&k| mel.feature_index_to_hz(k as f64) <= max_hz)
        .count()
        .max(1);

    log::debug!(
        "Computing beat strength: {} frames, {} low bands (<= {:.0} Hz), smoothing={}",
        frames.len(),
        band_count,
        max_hz,
        smoothing_frames
    );

    let compressed: Vec<Vec<f64>> = frames
        .iter()
        .map(|frame| {
            frame[..band_count]
                .iter()
                .map(|&m| (1.0 + LOG_COMPRESSION_GAMMA * m.max(0.0) as f64).ln())
                .collect()
        })
        .collect();

    let mut values: Vec<f64> = compressed
        .windows(2)
        .map(|pair| {
            pair[0]
                .iter()
                .zip(pair[1].iter())
                .map(|(prev, curr)| (curr - prev).max(0.0))
                .sum()
        })
        .collect();

    smooth_moving_average_in_place(&mut values, smoothing_frames);

    ContinuousSignal::new(mel_spectrogram.times[1..].to_vec(), values, None)
}

/// Centered moving-average smoothing in-place
fn smooth_moving_average_in_place(x: &mut [f64], window: usize) {
    if x.len() < 3 || window <= 1 {
        return;
    }
    let half = window / 2;
    let orig = x.to_vec();
    for (i, out) in x.iter_mut().enumerate() {
        let start = i.saturating_sub(half);
        let end = (i + half + 1).min(orig.len());
        *out = orig[start..end].iter().sum::<f64>() / (end - start) as f64;
    }
}

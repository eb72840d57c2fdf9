//! Spectral flux onset curve
//!
//! Frame-to-frame spectral change with half-wave rectification: only increases in
//! magnitude (attacks) contribute, decays are ignored.
//!
//! # Reference
//!
//! Bello, J. P., Daudet, L., Abdallah, S., Duxbury, C., Davies, M., & Sandler, M. B. (2005).
//! A Tutorial on Onset Detection in Music Signals.
//! *IEEE Transactions on Speech and Audio Processing*, 13(5), 1035-1047.

use crate::error::AnalysisError;
use crate::features::{ContinuousSignal, Spectrogram2D};

/// Numerical stability epsilon
const EPSILON: f32 = 1e-10;

/// Compute spectral flux from a magnitude spectrogram
///
/// Each frame is scaled by its own maximum before differencing so that the curve
/// responds to spectral shape changes rather than overall level. Flux value `n` is
/// the L2 norm of the rectified difference between frames `n` and `n - 1` and carries
/// the time of frame `n`.
///
/// # Arguments
///
/// * `spectrogram` - Magnitude spectrogram (n_frames × n_bins)
///
/// # Returns
///
/// Flux curve with `n_frames - 1` values; empty for fewer than two frames
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if frames have inconsistent lengths
pub fn spectral_flux(spectrogram: &Spectrogram2D) -> Result<ContinuousSignal, AnalysisError> {
    let frames = &spectrogram.frames;
    if frames.len() < 2 {
        return Ok(ContinuousSignal::empty());
    }

    let n_bins = frames[0].len();
    if let Some((i, frame)) = frames.iter().enumerate().find(|(_, f)| f.len() != n_bins) {
        return Err(AnalysisError::InvalidInput(format!(
            "Inconsistent frame lengths: frame 0 has {} bins, frame {} has {} bins",
            n_bins,
            i,
            frame.len()
        )));
    }

    log::debug!(
        "Computing spectral flux: {} frames, {} bins per frame",
        frames.len(),
        n_bins
    );

    let normalized: Vec<Vec<f32>> = frames
        .iter()
        .map(|frame| {
            let max_mag = frame.iter().copied().fold(0.0f32, f32::max);
            if max_mag > EPSILON {
                frame.iter().map(|&x| x / max_mag).collect()
            } else {
                vec![0.0f32; n_bins]
            }
        })
        .collect();

    let values: Vec<f64> = normalized
        .windows(2)
        .map(|pair| {
            let sum_sq: f64 = pair[0]
                .iter()
                .zip(pair[1].iter())
                .map(|(&prev, &curr)| ((curr - prev).max(0.0) as f64).powi(2))
                .sum();
            sum_sq.sqrt()
        })
        .collect();

    ContinuousSignal::new(spectrogram.times[1..].to_vec(), values, None)
}

//! Display-only transforms
//!
//! Decibel conversion for drawing spectrograms. Nothing in the analysis path consumes
//! these values; thresholds and peak picking always work on linear magnitudes.

use crate::features::Spectrogram2D;

/// Magnitude floor applied before taking the logarithm
const MAGNITUDE_EPSILON: f32 = 1e-10;

/// Convert a magnitude spectrogram to decibels
///
/// Each value becomes `20 * log10(max(m, eps))`, floored at `floor_db`. Zero
/// magnitudes therefore map to `floor_db` instead of negative infinity.
pub fn spectrogram_to_db(spectrogram: &Spectrogram2D, floor_db: f32) -> Spectrogram2D {
    let frames = spectrogram
        .frames
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&m| {
                    let db = 20.0 * m.abs().max(MAGNITUDE_EPSILON).log10();
                    if db.is_nan() {
                        floor_db
                    } else {
                        db.max(floor_db)
                    }
                })
                .collect()
        })
        .collect();

    Spectrogram2D {
        times: spectrogram.times.clone(),
        frames,
    }
}

/// Clamp a decibel value into `[min_db, max_db]`
///
/// NaN maps to `min_db`; swapped bounds are reordered.
pub fn clamp_db(value: f32, min_db: f32, max_db: f32) -> f32 {
    let (lo, hi) = if min_db <= max_db {
        (min_db, max_db)
    } else {
        (max_db, min_db)
    };
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

//! Phase search for a fixed tempo
//!
//! Offsets are sampled every `resolution_sec` across one beat period. Each offset is
//! scored by how close the beat candidates fall to the grid it anchors: a candidate at
//! circular distance `d` from its nearest grid line adds `1 - d / tolerance` when
//! `d <= tolerance`. Circular local maxima of the score are returned best first.
//!
//! Scores are compared after rounding to [`SCORE_QUANTUM`], so candidates a few
//! milliseconds apart form one flat plateau and yield a single hypothesis at its
//! earliest offset.

use crate::cancel::{CancellationToken, Outcome, CHECK_INTERVAL};
use crate::error::AnalysisError;

use super::{PhaseConfig, PhaseHypotheses, PhaseHypothesis};

/// Scores closer than this (after rounding) are treated as equal
const SCORE_QUANTUM: f64 = 1e-9;

/// Estimate phase hypotheses for a tempo
///
/// # Arguments
///
/// * `bpm` - Tempo in beats per minute
/// * `beat_candidate_times` - Candidate times in seconds
/// * `config` - Search parameters
/// * `token` - Checked every [`CHECK_INTERVAL`] candidate evaluations
///
/// # Returns
///
/// Hypotheses by descending score, ties by earliest offset; `active_phase_index` is 0.
/// No usable candidates yield an empty list.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for non-positive or non-finite `bpm`, and
/// `AnalysisError::InvalidConfig` if `config` fails validation
pub fn compute_phase_hypotheses(
    bpm: f64,
    beat_candidate_times: &[f64],
    config: &PhaseConfig,
    token: &CancellationToken,
) -> Result<Outcome<PhaseHypotheses>, AnalysisError> {
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(AnalysisError::InvalidInput(format!("Invalid BPM: {}", bpm)));
    }
    config.validate()?;

    let times: Vec<f64> = beat_candidate_times
        .iter()
        .copied()
        .filter(|t| t.is_finite())
        .collect();
    if times.is_empty() {
        return Ok(Outcome::Completed(PhaseHypotheses::default()));
    }

    let period = 60.0 / bpm;
    let tolerance = config.tolerance_fraction * period;
    let n_steps = ((period / config.resolution_sec) - 1e-9).ceil().max(1.0) as usize;
    let check_every = (CHECK_INTERVAL / times.len()).max(1);

    log::debug!(
        "Phase search: {:.2} BPM, period={:.4}s, {} offsets, {} candidates",
        bpm,
        period,
        n_steps,
        times.len()
    );

    let mut scores = Vec::with_capacity(n_steps);
    for step in 0..n_steps {
        if token.should_stop(step, check_every) {
            return Ok(Outcome::Cancelled);
        }
        let offset = step as f64 * config.resolution_sec;
        scores.push(alignment_score(&times, offset, period, tolerance));
    }

    let quantized: Vec<i64> = scores.iter().map(|&s| quantize(s)).collect();
    let mut maxima = plateau_maxima(&quantized);

    if maxima.is_empty() {
        // Flat score (or a single offset): fall back to the first best one
        let best = (0..n_steps).fold(0, |best, i| if quantized[i] > quantized[best] { i } else { best });
        if quantized[best] > 0 {
            maxima.push(best);
        }
    }

    maxima.sort_by(|&a, &b| quantized[b].cmp(&quantized[a]).then(a.cmp(&b)));
    maxima.truncate(config.max_hypotheses);

    let hypotheses: Vec<PhaseHypothesis> = maxima
        .into_iter()
        .map(|i| PhaseHypothesis {
            phase_offset: i as f64 * config.resolution_sec,
            score: scores[i],
        })
        .collect();

    if let Some(best) = hypotheses.first() {
        log::debug!(
            "Best phase offset {:.3}s (score {:.3}) of {} hypotheses",
            best.phase_offset,
            best.score,
            hypotheses.len()
        );
    }

    Ok(Outcome::Completed(PhaseHypotheses {
        hypotheses,
        active_phase_index: 0,
    }))
}

fn alignment_score(times: &[f64], offset: f64, period: f64, tolerance: f64) -> f64 {
    times
        .iter()
        .map(|&t| {
            let phase = (t - offset).rem_euclid(period);
            let distance = phase.min(period - phase);
            if distance <= tolerance {
                1.0 - distance / tolerance
            } else {
                0.0
            }
        })
        .sum()
}

/// Circular local maxima over runs of equal quantized score
///
/// A run is a maximum when it is positive and strictly above the runs on both sides.
/// Each maximum is reported at the first index of its run; a run wrapping past the
/// end of the period is reported at index 0. A constant score has no maxima.
fn plateau_maxima(quantized: &[i64]) -> Vec<usize> {
    let n = quantized.len();
    // Any index where a new run begins; none means the score is constant
    let Some(anchor) = (0..n).find(|&i| quantized[i] != quantized[(i + n - 1) % n]) else {
        return Vec::new();
    };

    let mut maxima = Vec::new();
    let mut start = anchor;
    loop {
        let value = quantized[start % n];
        let mut len = 1;
        while len < n && quantized[(start + len) % n] == value {
            len += 1;
        }
        let left = quantized[(start + n - 1) % n];
        let right = quantized[(start + len) % n];
        if value > 0 && value > left && value > right {
            let wraps = start % n + len > n;
            maxima.push(if wraps { 0 } else { start % n });
        }
        start += len;
        if start >= anchor + n {
            break;
        }
    }
    maxima.sort_unstable();
    maxima
}

fn quantize(score: f64) -> i64 {
    (score / SCORE_QUANTUM).round() as i64
}

//! Peak picking over continuous signals
//!
//! Turns a continuous curve (onset envelope, spectral flux, beat strength) into a
//! sparse list of peak times and strengths.
//!
//! Three pickers are provided:
//! - [`pick_peaks`]: fixed threshold on the globally normalized signal
//! - [`pick_peaks_adaptive`]: per-sample threshold `mean + k * std` over a local window
//! - [`apply_hysteresis_gate`]: two-threshold post-filter that suppresses chatter in
//!   sustained loud regions
//!
//! All pickers share the same local-maximum rule: a sample must be strictly greater
//! than the `pre_max` samples before it and greater than or equal to the `post_max`
//! samples after it, which resolves plateaus in favour of their first sample.
//!
//! Threshold and neighbour comparisons are made in normalized units with a tolerance
//! of [`COMPARISON_EPSILON`], so curves that differ by float noise (e.g. GPU versus CPU
//! feature extraction) yield the same peaks.
//!
//! # Example
//!
//! ```
//! use stratum_mir::features::peak_picking::{pick_peaks, PeakPickingOptions};
//!
//! let times = vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
//! let values = vec![0.0, 0.5, 1.0, 0.7, 0.3, 0.9, 0.2];
//! let options = PeakPickingOptions {
//!     threshold: 0.5,
//!     min_distance_sec: 0.15,
//!     pre_max: 1,
//!     post_max: 1,
//! };
//! let peaks = pick_peaks(&times, &values, &options);
//! assert_eq!(peaks.times, vec![0.2, 0.5]);
//! ```

use serde::{Deserialize, Serialize};

use super::onset::threshold::local_mean_std;
use crate::cancel::{CancellationToken, Outcome, CHECK_INTERVAL};
use crate::preprocessing::normalization::{min_max, MinMax, EPSILON};

/// Tolerance for threshold and neighbour comparisons in normalized units
pub const COMPARISON_EPSILON: f64 = 1e-6;

/// Options shared by the fixed and adaptive pickers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakPickingOptions {
    /// Fixed picker: normalized threshold in [0, 1].
    /// Adaptive picker: multiplier on the local standard deviation.
    pub threshold: f64,
    /// Minimum spacing between returned peaks in seconds
    pub min_distance_sec: f64,
    /// Samples before a peak it must strictly exceed
    pub pre_max: usize,
    /// Samples after a peak it must equal or exceed
    pub post_max: usize,
}

impl Default for PeakPickingOptions {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            min_distance_sec: 0.05,
            pre_max: 3,
            post_max: 3,
        }
    }
}

/// Options for the hysteresis gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HysteresisOptions {
    /// Peak strength needed to pass an open gate
    pub on_threshold: f64,
    /// Normalized signal level that re-opens a closed gate when crossed downward
    pub off_threshold: f64,
    /// Minimum spacing to the last kept peak in seconds
    pub min_distance_sec: f64,
}

impl Default for HysteresisOptions {
    fn default() -> Self {
        Self {
            on_threshold: 0.5,
            off_threshold: 0.2,
            min_distance_sec: 0.1,
        }
    }
}

/// Peak times with their normalized strengths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeakSet {
    /// Peak times in seconds, ascending
    pub times: Vec<f64>,
    /// Peak strengths in [0, 1], parallel to `times`
    pub strengths: Vec<f64>,
}

impl PeakSet {
    /// Number of peaks
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether there are no peaks
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Iterate `(time, strength)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.strengths.iter().copied())
    }

    fn from_pairs(pairs: Vec<(f64, f64)>) -> Self {
        let (times, strengths) = pairs.into_iter().unzip();
        Self { times, strengths }
    }
}

/// Output of the adaptive picker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptivePeakSet {
    /// Selected peaks
    pub peaks: PeakSet,
    /// Per-sample threshold mapped through the same global bounds as the strengths.
    /// Display-only; it never feeds back into selection.
    pub threshold_curve: Option<Vec<f64>>,
}

/// Normalize with global bounds; `None` when the signal is empty or constant
fn normalized(values: &[f64]) -> Option<(Vec<f64>, MinMax)> {
    let mm = min_max(values);
    if !mm.is_valid() || mm.range() <= EPSILON {
        return None;
    }
    let range = mm.range();
    Some((values.iter().map(|&v| (v - mm.min) / range).collect(), mm))
}

fn inputs_usable(times: &[f64], values: &[f64], caller: &str) -> bool {
    if times.len() != values.len() {
        log::warn!(
            "{}: mismatched input lengths ({} times, {} values), returning no peaks",
            caller,
            times.len(),
            values.len()
        );
        return false;
    }
    !values.is_empty()
}

/// Local-maximum rule: strictly above the `pre` samples before, at least the `post` after
#[inline]
fn is_local_max(norm: &[f64], i: usize, pre: usize, post: usize) -> bool {
    let v = norm[i];
    if !v.is_finite() {
        return false;
    }
    let pre_start = i.saturating_sub(pre);
    if norm[pre_start..i].iter().any(|&p| v <= p + COMPARISON_EPSILON) {
        return false;
    }
    let post_end = (i + 1 + post).min(norm.len());
    norm[i + 1..post_end]
        .iter()
        .all(|&q| v >= q - COMPARISON_EPSILON)
}

/// Minimum-distance suppression over time-ordered candidates
///
/// A candidate within `min_distance` of the last accepted peak replaces it when
/// strictly stronger and is dropped otherwise. Replacement moves the accepted peak
/// later in time, so spacing to earlier peaks only grows.
fn suppress_close_peaks(candidates: Vec<(f64, f64)>, min_distance: f64) -> Vec<(f64, f64)> {
    let mut kept: Vec<(f64, f64)> = Vec::with_capacity(candidates.len());
    for (time, strength) in candidates {
        match kept.last_mut() {
            Some(last) if time - last.0 < min_distance => {
                if strength > last.1 {
                    *last = (time, strength);
                }
            }
            _ => kept.push((time, strength)),
        }
    }
    kept
}

/// Pick peaks above a fixed normalized threshold
///
/// # Arguments
///
/// * `times` - Sample times in seconds (ascending)
/// * `values` - Signal values, same length as `times`
/// * `options` - `threshold` in [0, 1] against the min/max-normalized signal
///
/// # Returns
///
/// Peaks in time order with normalized strengths. Empty, mismatched or constant
/// input yields an empty set.
///
/// # Algorithm
///
/// 1. Normalize values to [0, 1] with the global min/max
/// 2. Keep samples at or above `threshold` that satisfy the local-maximum rule
/// 3. Apply minimum-distance suppression (stronger later peaks displace weaker
///    earlier ones within the window)
pub fn pick_peaks(times: &[f64], values: &[f64], options: &PeakPickingOptions) -> PeakSet {
    log::debug!(
        "Picking peaks: {} samples, threshold={:.3}, min_distance={:.3}s, pre={}, post={}",
        values.len(),
        options.threshold,
        options.min_distance_sec,
        options.pre_max,
        options.post_max
    );

    if !inputs_usable(times, values, "pick_peaks") {
        return PeakSet::default();
    }

    let Some((norm, _)) = normalized(values) else {
        log::debug!("Constant signal, no peaks");
        return PeakSet::default();
    };

    let candidates: Vec<(f64, f64)> = (0..norm.len())
        .filter(|&i| {
            norm[i] >= options.threshold - COMPARISON_EPSILON
                && is_local_max(&norm, i, options.pre_max, options.post_max)
        })
        .map(|i| (times[i], norm[i]))
        .collect();

    let peaks = PeakSet::from_pairs(suppress_close_peaks(candidates, options.min_distance_sec));
    log::debug!("Found {} peaks", peaks.len());
    peaks
}

/// Pick peaks above a locally adaptive threshold
///
/// For every sample the threshold is `mean + options.threshold * std` over a centered
/// window of `window_size` samples (shrinking at the signal edges). The raw value must
/// exceed it; the local-maximum and minimum-distance rules match [`pick_peaks`].
///
/// # Arguments
///
/// * `times` - Sample times in seconds (ascending)
/// * `values` - Signal values, same length as `times`
/// * `window_size` - Window length in samples
/// * `options` - `threshold` is the standard-deviation multiplier
/// * `include_threshold_curve` - Also return the threshold curve for display
/// * `token` - Checked every [`CHECK_INTERVAL`] samples
///
/// # Returns
///
/// `Outcome::Cancelled` if the token fires mid-scan, otherwise the peaks (and the
/// optional threshold curve).
pub fn pick_peaks_adaptive(
    times: &[f64],
    values: &[f64],
    window_size: usize,
    options: &PeakPickingOptions,
    include_threshold_curve: bool,
    token: &CancellationToken,
) -> Outcome<AdaptivePeakSet> {
    log::debug!(
        "Adaptive peak picking: {} samples, window={}, k={:.2}, min_distance={:.3}s",
        values.len(),
        window_size,
        options.threshold,
        options.min_distance_sec
    );

    if !inputs_usable(times, values, "pick_peaks_adaptive") {
        return Outcome::Completed(AdaptivePeakSet::default());
    }

    let Some((norm, mm)) = normalized(values) else {
        log::debug!("Constant signal, no peaks");
        return Outcome::Completed(AdaptivePeakSet::default());
    };
    let range = mm.range();

    let (means, stds) = local_mean_std(values, window_size);
    if token.is_cancelled() {
        return Outcome::Cancelled;
    }

    let mut norm_threshold = Vec::with_capacity(values.len());
    let mut candidates = Vec::new();

    for i in 0..values.len() {
        if token.should_stop(i, CHECK_INTERVAL) {
            log::debug!("Adaptive peak picking cancelled at sample {}", i);
            return Outcome::Cancelled;
        }

        let local = (means[i] + options.threshold * stds[i] - mm.min) / range;
        norm_threshold.push(local);

        if norm[i] > local + COMPARISON_EPSILON
            && is_local_max(&norm, i, options.pre_max, options.post_max)
        {
            candidates.push((times[i], norm[i]));
        }
    }

    let peaks = PeakSet::from_pairs(suppress_close_peaks(candidates, options.min_distance_sec));
    log::debug!("Adaptive picker found {} peaks", peaks.len());

    Outcome::Completed(AdaptivePeakSet {
        peaks,
        threshold_curve: include_threshold_curve.then_some(norm_threshold),
    })
}

/// Filter an existing peak list through a two-threshold gate
///
/// The gate starts open. A peak is kept when the gate is open and its strength is at
/// least `on_threshold`; keeping a peak closes the gate. A closed gate re-opens once
/// the normalized signal dips below `off_threshold` somewhere after the last kept
/// peak. Peaks within `min_distance_sec` of the last kept peak are skipped regardless
/// of gate state.
///
/// # Arguments
///
/// * `times`, `values` - The signal the peaks were picked from
/// * `peak_times`, `peak_strengths` - Peaks to filter, in time order
/// * `options` - Gate thresholds
///
/// # Returns
///
/// The kept peaks. Mismatched, empty or constant input yields an empty set.
pub fn apply_hysteresis_gate(
    times: &[f64],
    values: &[f64],
    peak_times: &[f64],
    peak_strengths: &[f64],
    options: &HysteresisOptions,
) -> PeakSet {
    log::debug!(
        "Hysteresis gate: {} peaks, on={:.3}, off={:.3}, min_distance={:.3}s",
        peak_times.len(),
        options.on_threshold,
        options.off_threshold,
        options.min_distance_sec
    );

    if !inputs_usable(times, values, "apply_hysteresis_gate")
        || !inputs_usable(peak_times, peak_strengths, "apply_hysteresis_gate")
    {
        return PeakSet::default();
    }

    let Some((norm, _)) = normalized(values) else {
        return PeakSet::default();
    };

    let mut kept = Vec::new();
    let mut gate_open = true;
    let mut last_kept: Option<f64> = None;
    // First signal sample not yet inspected for a re-opening dip
    let mut cursor = 0usize;

    for (&time, &strength) in peak_times.iter().zip(peak_strengths.iter()) {
        if let Some(last) = last_kept {
            if time - last < options.min_distance_sec {
                continue;
            }
        }

        if !gate_open {
            while cursor < times.len() && times[cursor] < time {
                if norm[cursor] < options.off_threshold - COMPARISON_EPSILON {
                    gate_open = true;
                    break;
                }
                cursor += 1;
            }
        }

        if gate_open && strength >= options.on_threshold - COMPARISON_EPSILON {
            kept.push((time, strength));
            gate_open = false;
            last_kept = Some(time);
            while cursor < times.len() && times[cursor] <= time {
                cursor += 1;
            }
        }
    }

    log::debug!("Hysteresis gate kept {} of {} peaks", kept.len(), peak_times.len());
    PeakSet::from_pairs(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_times(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * step).collect()
    }

    fn opts(threshold: f64, min_distance_sec: f64, pre_max: usize, post_max: usize) -> PeakPickingOptions {
        PeakPickingOptions {
            threshold,
            min_distance_sec,
            pre_max,
            post_max,
        }
    }

    #[test]
    fn test_pick_peaks_basic() {
        let values = vec![0.0, 0.5, 1.0, 0.7, 0.3, 0.9, 0.2];
        let times = frame_times(values.len(), 0.1);
        let peaks = pick_peaks(&times, &values, &opts(0.5, 0.0, 1, 1));
        assert_eq!(peaks.len(), 2);
        assert!((peaks.times[0] - 0.2).abs() < 1e-12);
        assert!((peaks.times[1] - 0.5).abs() < 1e-12);
        assert_eq!(peaks.strengths[0], 1.0);
        assert!((peaks.strengths[1] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_pick_peaks_degenerate_inputs() {
        let o = PeakPickingOptions::default();
        assert!(pick_peaks(&[], &[], &o).is_empty());
        assert!(pick_peaks(&[0.0, 0.1], &[1.0], &o).is_empty());
        assert!(pick_peaks(&frame_times(10, 0.1), &[0.4; 10], &o).is_empty());
    }

    #[test]
    fn test_plateau_resolves_to_first_sample() {
        let values = vec![0.0, 1.0, 1.0, 1.0, 0.0];
        let times = frame_times(values.len(), 0.1);
        let peaks = pick_peaks(&times, &values, &opts(0.5, 0.0, 2, 2));
        assert_eq!(peaks.len(), 1);
        assert!((peaks.times[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_float_noise_does_not_split_plateau() {
        let values = vec![0.0, 1.0, 1.0 + 1e-9, 1.0 - 1e-9, 0.0];
        let times = frame_times(values.len(), 0.1);
        let peaks = pick_peaks(&times, &values, &opts(0.5, 0.0, 2, 2));
        assert_eq!(peaks.len(), 1);
    }

    #[test]
    fn test_stronger_later_peak_displaces_earlier() {
        // Peaks at 0.1 (0.6) and 0.3 (1.0) are 0.2s apart with a 0.5s window
        let values = vec![0.0, 0.6, 0.1, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.7, 0.0];
        let times = frame_times(values.len(), 0.1);
        let peaks = pick_peaks(&times, &values, &opts(0.1, 0.5, 1, 1));
        assert_eq!(peaks.len(), 2);
        assert!((peaks.times[0] - 0.3).abs() < 1e-12);
        assert!((peaks.times[1] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_min_distance_invariant() {
        let values: Vec<f64> = (0..400)
            .map(|i| ((i as f64 * 0.37).sin() * (i as f64 * 0.05).cos()).abs())
            .collect();
        let times = frame_times(values.len(), 0.01);
        for min_distance in [0.0, 0.03, 0.1, 0.25] {
            let peaks = pick_peaks(&times, &values, &opts(0.2, min_distance, 1, 1));
            for w in peaks.times.windows(2) {
                assert!(w[1] - w[0] >= min_distance, "{:?} closer than {}", w, min_distance);
            }
        }
    }

    #[test]
    fn test_threshold_monotonic() {
        let values: Vec<f64> = (0..300)
            .map(|i| ((i * 37 % 101) as f64 / 101.0) * ((i as f64 * 0.2).sin() + 1.2))
            .collect();
        let times = frame_times(values.len(), 0.01);
        let mut previous: Option<Vec<f64>> = None;
        for step in 0..=10 {
            let threshold = step as f64 / 10.0;
            let peaks = pick_peaks(&times, &values, &opts(threshold, 0.04, 2, 2));
            if let Some(prev) = &previous {
                assert!(peaks.times.iter().all(|t| prev.contains(t)));
            }
            previous = Some(peaks.times);
        }
    }

    #[test]
    fn test_adaptive_finds_spikes_over_varying_floor() {
        // Slowly rising floor with spikes every 20 samples
        let values: Vec<f64> = (0..200)
            .map(|i| {
                let floor = i as f64 / 200.0;
                if i % 20 == 10 {
                    floor + 0.5
                } else {
                    floor
                }
            })
            .collect();
        let times = frame_times(values.len(), 0.01);
        let result = pick_peaks_adaptive(
            &times,
            &values,
            15,
            &opts(2.5, 0.05, 3, 3),
            true,
            &CancellationToken::new(),
        )
        .completed()
        .unwrap();

        assert_eq!(result.peaks.len(), 10);
        for (k, t) in result.peaks.times.iter().enumerate() {
            assert!((t - (0.1 + 0.2 * k as f64)).abs() < 1e-9);
        }
        let curve = result.threshold_curve.unwrap();
        assert_eq!(curve.len(), values.len());
    }

    #[test]
    fn test_adaptive_min_distance_invariant() {
        let values: Vec<f64> = (0..600)
            .map(|i| ((i as f64 * 0.37).sin() * (i as f64 * 0.05).cos()).abs() + i as f64 / 600.0)
            .collect();
        let times = frame_times(values.len(), 0.01);
        let token = CancellationToken::new();
        for window in [5, 25, 101] {
            for min_distance in [0.0, 0.03, 0.1, 0.25] {
                let peaks = pick_peaks_adaptive(&times, &values, window, &opts(0.5, min_distance, 1, 1), false, &token)
                    .completed()
                    .unwrap()
                    .peaks;
                assert!(!peaks.is_empty());
                for w in peaks.times.windows(2) {
                    assert!(
                        w[1] - w[0] >= min_distance,
                        "{:?} closer than {} (window {})",
                        w,
                        min_distance,
                        window
                    );
                }
            }
        }
    }

    #[test]
    fn test_adaptive_multiplier_monotonic() {
        let values: Vec<f64> = (0..300)
            .map(|i| ((i * 37 % 101) as f64 / 101.0) * ((i as f64 * 0.2).sin() + 1.2))
            .collect();
        let times = frame_times(values.len(), 0.01);
        let token = CancellationToken::new();
        let mut previous: Option<Vec<f64>> = None;
        for step in 0..=12 {
            let k = step as f64 * 0.25;
            let peaks = pick_peaks_adaptive(&times, &values, 21, &opts(k, 0.0, 2, 2), false, &token)
                .completed()
                .unwrap()
                .peaks;
            if let Some(prev) = &previous {
                assert!(peaks.times.iter().all(|t| prev.contains(t)), "k={} added peaks", k);
            }
            previous = Some(peaks.times);
        }
    }

    #[test]
    fn test_adaptive_without_curve_and_degenerate() {
        let token = CancellationToken::new();
        let times = frame_times(50, 0.01);
        let flat = pick_peaks_adaptive(&times, &[1.0; 50], 5, &opts(1.0, 0.0, 1, 1), false, &token)
            .completed()
            .unwrap();
        assert!(flat.peaks.is_empty());
        assert!(flat.threshold_curve.is_none());

        let mismatched = pick_peaks_adaptive(&times, &[1.0; 10], 5, &opts(1.0, 0.0, 1, 1), true, &token);
        assert_eq!(mismatched, Outcome::Completed(AdaptivePeakSet::default()));
    }

    #[test]
    fn test_adaptive_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let values: Vec<f64> = (0..100).map(|i| (i % 7) as f64).collect();
        let times = frame_times(values.len(), 0.01);
        let out = pick_peaks_adaptive(&times, &values, 9, &PeakPickingOptions::default(), false, &token);
        assert!(out.is_cancelled());
    }

    #[test]
    fn test_hysteresis_gate_reopens_after_dip() {
        let values = vec![0.2, 0.9, 0.9, 0.9, 0.1, 0.9];
        let times = frame_times(values.len(), 0.1);
        let peak_times = vec![0.1, 0.2, 0.3, 0.5];
        let peak_strengths = vec![0.9, 0.9, 0.9, 0.9];
        let gated = apply_hysteresis_gate(
            &times,
            &values,
            &peak_times,
            &peak_strengths,
            &HysteresisOptions {
                on_threshold: 0.8,
                off_threshold: 0.3,
                min_distance_sec: 0.0,
            },
        );
        assert_eq!(gated.len(), 2);
        assert!((gated.times[0] - 0.1).abs() < 1e-12);
        assert!((gated.times[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_hysteresis_min_distance_skips_regardless_of_gate() {
        let values = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let times = frame_times(values.len(), 0.1);
        let gated = apply_hysteresis_gate(
            &times,
            &values,
            &[0.1, 0.3, 0.5],
            &[1.0, 1.0, 1.0],
            &HysteresisOptions {
                on_threshold: 0.5,
                off_threshold: 0.3,
                min_distance_sec: 0.25,
            },
        );
        // 0.3 is too close to 0.1; the dip at 0.2 re-opens the gate for 0.5
        assert_eq!(gated.times.len(), 2);
        assert!((gated.times[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_hysteresis_weak_peaks_rejected() {
        let values = vec![0.0, 0.4, 0.0, 1.0, 0.0];
        let times = frame_times(values.len(), 0.1);
        let gated = apply_hysteresis_gate(
            &times,
            &values,
            &[0.1, 0.3],
            &[0.4, 1.0],
            &HysteresisOptions::default(),
        );
        assert_eq!(gated.times.len(), 1);
        assert!((gated.times[0] - 0.3).abs() < 1e-12);
    }
}

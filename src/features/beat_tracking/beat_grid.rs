//! Beat grid generation
//!
//! A beat grid is a tempo, a phase offset and a user nudge. Beat times are derived on
//! demand by [`generate_beat_times`], a pure function that is cheap enough to call for
//! every redraw.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::features::period::TempoHypothesis;

use super::PhaseHypothesis;

/// Periodic beat grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    bpm: f64,
    phase_offset: f64,
    user_nudge: f64,
    is_locked: bool,
}

impl BeatGrid {
    /// Create an unlocked grid
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidConfig` if `bpm` is not positive and finite, or
    /// the offset is not finite
    pub fn new(bpm: f64, phase_offset: f64) -> Result<Self, AnalysisError> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "Beat grid BPM must be positive, got {}",
                bpm
            )));
        }
        if !phase_offset.is_finite() {
            return Err(AnalysisError::InvalidConfig(format!(
                "Beat grid phase offset must be finite, got {}",
                phase_offset
            )));
        }
        Ok(Self {
            bpm,
            phase_offset,
            user_nudge: 0.0,
            is_locked: false,
        })
    }

    /// Unlocked grid from a tempo hypothesis and one of its phase hypotheses
    pub fn provisional(
        hypothesis: &TempoHypothesis,
        phase: &PhaseHypothesis,
    ) -> Result<Self, AnalysisError> {
        Self::new(hypothesis.bpm, phase.phase_offset)
    }

    /// Tempo in BPM
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Time of the first beat before nudging
    pub fn phase_offset(&self) -> f64 {
        self.phase_offset
    }

    /// Accumulated user offset in seconds
    pub fn user_nudge(&self) -> f64 {
        self.user_nudge
    }

    /// Whether the grid is locked against edits
    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    /// Beat period in seconds
    pub fn period(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Locked copy
    pub fn lock(&self) -> Self {
        Self {
            is_locked: true,
            ..self.clone()
        }
    }

    /// Unlocked copy
    pub fn unlock(&self) -> Self {
        Self {
            is_locked: false,
            ..self.clone()
        }
    }

    /// Copy shifted by `delta_sec`; a locked grid is returned unchanged
    pub fn nudge(&self, delta_sec: f64) -> Self {
        if self.is_locked || !delta_sec.is_finite() {
            return self.clone();
        }
        Self {
            user_nudge: self.user_nudge + delta_sec,
            ..self.clone()
        }
    }

    /// Beat times in `[0, duration_sec)`
    pub fn beat_times(&self, duration_sec: f64) -> Vec<f64> {
        generate_beat_times(self.bpm, self.phase_offset, self.user_nudge, duration_sec)
    }
}

/// Generate beat times `phase_offset + user_nudge + k * 60 / bpm`
///
/// Only times in `[0, duration_sec)` are returned; beats pushed before zero by the
/// offset are skipped. Each time is computed by multiplication, so long grids do not
/// accumulate drift.
///
/// # Returns
///
/// Ascending beat times; empty for a non-positive or non-finite `bpm` or duration
///
/// # Example
///
/// ```
/// use stratum_mir::features::beat_tracking::beat_grid::generate_beat_times;
///
/// let beats = generate_beat_times(120.0, 0.5, 0.0, 10.0);
/// assert_eq!(beats.len(), 19);
/// assert_eq!(beats[0], 0.5);
/// assert_eq!(beats[18], 9.5);
/// ```
pub fn generate_beat_times(bpm: f64, phase_offset: f64, user_nudge: f64, duration_sec: f64) -> Vec<f64> {
    if !(bpm.is_finite() && bpm > 0.0) || !(duration_sec > 0.0) {
        return Vec::new();
    }
    let start = phase_offset + user_nudge;
    if !start.is_finite() || start >= duration_sec {
        return Vec::new();
    }

    let period = 60.0 / bpm;
    let first_k = if start < 0.0 {
        (-start / period).ceil() as u64
    } else {
        0
    };

    (first_k..)
        .map(|k| start + k as f64 * period)
        .skip_while(|&t| t < 0.0)
        .take_while(|&t| t < duration_sec)
        .collect()
}

/// Round a grid position to the nearest `1 / subdivision` line
///
/// Positions are in grid units (e.g. beats). No-op when `enabled` is false or
/// `subdivision <= 1`.
pub fn snap_to_grid(position: f64, subdivision: u32, enabled: bool) -> f64 {
    if !enabled || subdivision <= 1 {
        return position;
    }
    let step = subdivision as f64;
    (position * step).round() / step
}

/// Snap a time in seconds to the nearest beat subdivision of `grid`
pub fn snap_time_to_beat_grid(time_sec: f64, grid: &BeatGrid, subdivision: u32) -> f64 {
    let origin = grid.phase_offset + grid.user_nudge;
    let period = grid.period();
    let beats = (time_sec - origin) / period;
    let snapped = if subdivision <= 1 {
        beats.round()
    } else {
        snap_to_grid(beats, subdivision, true)
    };
    origin + snapped * period
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::period::HypothesisEvidence;

    #[test]
    fn test_generate_beat_times_exact() {
        let beats = generate_beat_times(120.0, 0.5, 0.0, 10.0);
        let expected: Vec<f64> = (1..20).map(|k| k as f64 * 0.5).collect();
        assert_eq!(beats, expected);
        assert!(beats.iter().all(|&t| (0.0..10.0).contains(&t)));
    }

    #[test]
    fn test_negative_start_skips_to_first_positive_beat() {
        let beats = generate_beat_times(120.0, 0.1, -1.2, 2.0);
        // start = -1.1, so beats fall at 0.4, 0.9, 1.4, 1.9
        assert_eq!(beats.len(), 4);
        assert!((beats[0] - 0.4).abs() < 1e-9);
        assert!(beats.iter().all(|&t| t >= 0.0));
    }

    #[test]
    fn test_generate_beat_times_degenerate() {
        assert!(generate_beat_times(0.0, 0.0, 0.0, 10.0).is_empty());
        assert!(generate_beat_times(-60.0, 0.0, 0.0, 10.0).is_empty());
        assert!(generate_beat_times(120.0, 0.0, 0.0, 0.0).is_empty());
        assert!(generate_beat_times(120.0, 11.0, 0.0, 10.0).is_empty());
    }

    #[test]
    fn test_beat_grid_validation() {
        assert!(matches!(BeatGrid::new(0.0, 0.0), Err(AnalysisError::InvalidConfig(_))));
        assert!(BeatGrid::new(f64::NAN, 0.0).is_err());
        assert!(BeatGrid::new(120.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_nudge_and_lock() {
        let grid = BeatGrid::new(120.0, 0.5).unwrap().nudge(0.1);
        assert!((grid.user_nudge() - 0.1).abs() < 1e-12);
        assert_eq!(grid.beat_times(1.0).len(), 1);
        assert!((grid.beat_times(1.0)[0] - 0.6).abs() < 1e-9);

        let locked = grid.lock();
        assert!(locked.is_locked());
        assert_eq!(locked.nudge(0.2).user_nudge(), grid.user_nudge());
        assert!((locked.unlock().nudge(0.2).user_nudge() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_provisional_grid() {
        let hypothesis = TempoHypothesis {
            id: "fam-128.00@1:1".to_string(),
            bpm: 128.0,
            confidence: 0.8,
            family_id: "fam-128.00".to_string(),
            harmonic_ratio: 1.0,
            evidence: HypothesisEvidence {
                supporting_interval_count: 10,
                bin_range: (127.5, 128.5),
            },
        };
        let phase = PhaseHypothesis {
            phase_offset: 0.12,
            score: 9.0,
        };
        let grid = BeatGrid::provisional(&hypothesis, &phase).unwrap();
        assert_eq!(grid.bpm(), 128.0);
        assert_eq!(grid.phase_offset(), 0.12);
        assert!(!grid.is_locked());
        assert!((grid.period() - 60.0 / 128.0).abs() < 1e-12);
    }

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(1.3, 4, true), 1.25);
        assert_eq!(snap_to_grid(1.3, 4, false), 1.3);
        assert_eq!(snap_to_grid(1.3, 1, true), 1.3);
        assert_eq!(snap_to_grid(2.9, 2, true), 3.0);
    }

    #[test]
    fn test_snap_time_to_beat_grid() {
        let grid = BeatGrid::new(120.0, 0.1).unwrap();
        assert!((snap_time_to_beat_grid(0.58, &grid, 1) - 0.6).abs() < 1e-9);
        assert!((snap_time_to_beat_grid(0.33, &grid, 2) - 0.35).abs() < 1e-9);
    }
}

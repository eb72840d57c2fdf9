//! Confidence scoring
//!
//! Tempo confidence combines two things the interval histogram shows directly:
//! how large a share of all inter-onset intervals support a tempo, and how tightly
//! those supporting intervals cluster.
//!
//! ```text
//! share      = supporting / total
//! spread     = 60 / lo_bpm - 60 / hi_bpm          (seconds)
//! tightness  = JITTER_SCALE_SEC / (JITTER_SCALE_SEC + spread)
//! confidence = sqrt(share * tightness)
//! ```
//!
//! Spread is measured in seconds because onset times are quantized to analysis frames:
//! one frame of jitter is the same number of seconds at every tempo, but a much wider
//! BPM range at fast tempos than at slow ones.

/// Interval spread at which tightness drops to one half (about one analysis hop)
pub const JITTER_SCALE_SEC: f64 = 0.01;

/// Confidence of a tempo hypothesis
///
/// # Arguments
///
/// * `supporting` - Intervals inside the hypothesis window
/// * `total` - All intervals that entered the histogram
/// * `bpm_range` - Lowest and highest supporting tempo
///
/// # Returns
///
/// Score in [0, 1]: increasing in `supporting`, decreasing in the width of
/// `bpm_range`; 0.0 when nothing supports the hypothesis
pub fn tempo_confidence(supporting: u32, total: usize, bpm_range: (f64, f64)) -> f64 {
    let (lo_bpm, hi_bpm) = bpm_range;
    if supporting == 0 || total == 0 || !(lo_bpm > 0.0) || !(hi_bpm >= lo_bpm) {
        return 0.0;
    }

    let share = (supporting as f64 / total as f64).min(1.0);
    let spread_sec = (60.0 / lo_bpm - 60.0 / hi_bpm).max(0.0);
    let tightness = JITTER_SCALE_SEC / (JITTER_SCALE_SEC + spread_sec);

    (share * tightness).sqrt().clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_support_tight_cluster() {
        assert!((tempo_confidence(10, 10, (120.0, 120.0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_support() {
        assert_eq!(tempo_confidence(0, 10, (120.0, 120.0)), 0.0);
        assert_eq!(tempo_confidence(3, 0, (120.0, 121.0)), 0.0);
        assert_eq!(tempo_confidence(3, 10, (0.0, 121.0)), 0.0);
    }

    #[test]
    fn test_spread_lowers_confidence() {
        let tight = tempo_confidence(5, 10, (119.9, 120.1));
        let loose = tempo_confidence(5, 10, (117.0, 123.0));
        assert!(tight > loose);
        assert!(loose > 0.0);
    }

    #[test]
    fn test_share_raises_confidence() {
        let minority = tempo_confidence(2, 10, (120.0, 120.0));
        let majority = tempo_confidence(8, 10, (120.0, 120.0));
        assert!(majority > minority);
    }

    #[test]
    fn test_one_frame_jitter_scores_equally_across_tempos() {
        // 512-sample hop at 44.1 kHz
        let hop = 512.0 / 44100.0;
        let fast = (60.0 / (0.5 + hop), 60.0 / 0.5);
        let slow = (60.0 / (1.0 + hop), 60.0 / 1.0);
        let a = tempo_confidence(10, 20, fast);
        let b = tempo_confidence(10, 20, slow);
        assert!((a - b).abs() < 1e-9);
    }
}

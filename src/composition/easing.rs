//! Easing curves between composed-signal nodes

use serde::{Deserialize, Serialize};

/// Interpolation from one node to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationKind {
    /// Straight line
    #[default]
    Linear,
    /// Keep the starting value until the next node
    Hold,
    /// Quadratic, slow start
    EaseIn,
    /// Quadratic, slow end
    EaseOut,
    /// Quadratic, slow start and end
    EaseInOut,
    /// Base-2 exponential, slow start
    ExponentialIn,
    /// Base-2 exponential, slow end
    ExponentialOut,
}

/// Map normalized progress `t` through an easing curve
///
/// `t` is clamped to [0, 1]; the result is in [0, 1]. The exponential curves are pinned
/// at their asymptotic endpoint (`ExponentialIn(0) == 0`, `ExponentialOut(1) == 1`).
///
/// # Example
///
/// ```
/// use stratum_mir::composition::easing::{apply_easing, InterpolationKind};
///
/// assert_eq!(apply_easing(0.5, InterpolationKind::Linear), 0.5);
/// assert_eq!(apply_easing(0.5, InterpolationKind::Hold), 0.0);
/// assert_eq!(apply_easing(0.5, InterpolationKind::EaseIn), 0.25);
/// ```
pub fn apply_easing(t: f64, kind: InterpolationKind) -> f64 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    match kind {
        InterpolationKind::Linear => t,
        InterpolationKind::Hold => 0.0,
        InterpolationKind::EaseIn => t * t,
        InterpolationKind::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
        InterpolationKind::EaseInOut => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
            }
        }
        InterpolationKind::ExponentialIn => {
            if t == 0.0 {
                0.0
            } else {
                2f64.powf(10.0 * t - 10.0)
            }
        }
        InterpolationKind::ExponentialOut => {
            if t == 1.0 {
                1.0
            } else {
                1.0 - 2f64.powf(-10.0 * t)
            }
        }
    }
}

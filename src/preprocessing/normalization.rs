//! Value normalization utilities
//!
//! Supports multiple bound-estimation modes for mapping a signal into [0, 1]:
//! - Identity (`None`)
//! - Global min/max
//! - Robust 5th-95th percentile
//! - Declared domain (`Fixed`, falling back to global)
//! - Custom percentile pair
//!
//! Bounds for static signals are typically requested many times, so a caller-owned
//! [`BoundsCache`] memoizes them keyed by signal generation and mode. The cache is a pure
//! optimization: dropping it never changes a result.
//!
//! # Example
//!
//! ```
//! use stratum_mir::features::ContinuousSignal;
//! use stratum_mir::preprocessing::normalization::{
//!     compute_bounds, denormalize, normalize, NormalizationMode,
//! };
//!
//! let signal = ContinuousSignal::new(vec![0.0, 0.1, 0.2], vec![2.0, 4.0, 6.0], None)?;
//! let bounds = compute_bounds(&signal, &NormalizationMode::Global);
//! let n = normalize(5.0, bounds);
//! assert!((n - 0.75).abs() < 1e-12);
//! assert!((denormalize(n, bounds) - 5.0).abs() < 1e-12);
//! # Ok::<(), stratum_mir::AnalysisError>(())
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::features::ContinuousSignal;

/// Ranges narrower than this are treated as degenerate
pub const EPSILON: f64 = 1e-12;

/// Result of a single-pass min/max scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    /// Smallest finite value (`+inf` for empty input)
    pub min: f64,
    /// Largest finite value (`-inf` for empty input)
    pub max: f64,
}

impl MinMax {
    /// Whether the scan saw at least one finite value
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    /// `max - min`, or 0 for an empty scan
    pub fn range(&self) -> f64 {
        if self.is_valid() {
            self.max - self.min
        } else {
            0.0
        }
    }
}

/// Scan values for their minimum and maximum
///
/// Empty input yields `{min: +inf, max: -inf}`; callers must check
/// [`MinMax::is_valid`]. Non-finite values are ignored.
pub fn min_max(values: &[f64]) -> MinMax {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        if !v.is_finite() {
            continue;
        }
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    MinMax { min, max }
}

/// Linear-interpolated percentile of pre-sorted values
///
/// `p` is in percent and clamped to [0, 100]. Sorting is the caller's job.
/// Returns `None` for empty input.
pub fn percentile(sorted_values: &[f64], p: f64) -> Option<f64> {
    if sorted_values.is_empty() {
        return None;
    }
    if sorted_values.len() == 1 {
        return Some(sorted_values[0]);
    }

    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let rank = p / 100.0 * (sorted_values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;

    Some(sorted_values[lower] + (sorted_values[upper] - sorted_values[lower]) * frac)
}

/// How normalization bounds are derived from a signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NormalizationMode {
    /// Identity bounds [0, 1]
    None,
    /// Full min/max of the signal
    Global,
    /// 5th to 95th percentile
    Robust,
    /// The signal's declared domain, or `Global` when it has none
    Fixed,
    /// Custom percentile pair, in percent
    Percentile {
        /// Lower percentile (0-100)
        lo: f64,
        /// Upper percentile (0-100)
        hi: f64,
    },
}

impl NormalizationMode {
    /// Check mode parameters
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidConfig` for percentiles outside [0, 100] or
    /// with `lo >= hi`.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if let NormalizationMode::Percentile { lo, hi } = *self {
            if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "Percentiles must be in [0, 100], got ({}, {})",
                    lo, hi
                )));
            }
            if lo >= hi {
                return Err(AnalysisError::InvalidConfig(format!(
                    "Lower percentile must be below upper, got ({}, {})",
                    lo, hi
                )));
            }
        }
        Ok(())
    }

    fn cache_key(&self) -> ModeKey {
        match *self {
            NormalizationMode::None => ModeKey::None,
            NormalizationMode::Global => ModeKey::Global,
            NormalizationMode::Robust => ModeKey::Robust,
            NormalizationMode::Fixed => ModeKey::Fixed,
            NormalizationMode::Percentile { lo, hi } => ModeKey::Percentile(lo.to_bits(), hi.to_bits()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ModeKey {
    None,
    Global,
    Robust,
    Fixed,
    Percentile(u64, u64),
}

/// Normalization bounds
///
/// Always satisfies `max - min > 0`: constructing degenerate bounds widens them to
/// `max = min + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Value mapped to 0
    pub min: f64,
    /// Value mapped to 1
    pub max: f64,
}

impl Bounds {
    /// Build bounds, applying the widening rule
    ///
    /// Non-finite input falls back to the unit interval.
    pub fn new(min: f64, max: f64) -> Self {
        if !min.is_finite() || !max.is_finite() {
            return Self::unit();
        }
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        if max - min <= EPSILON {
            Self { min, max: min + 1.0 }
        } else {
            Self { min, max }
        }
    }

    /// The identity bounds [0, 1]
    pub fn unit() -> Self {
        Self { min: 0.0, max: 1.0 }
    }

    /// `max - min`, always positive
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// Derive normalization bounds for a signal
///
/// Percentile parameters outside [0, 100] are clamped here; use
/// [`NormalizationMode::validate`] to reject them up front.
pub fn compute_bounds(signal: &ContinuousSignal, mode: &NormalizationMode) -> Bounds {
    compute_bounds_for_values(signal.values(), signal.domain_hint(), mode)
}

pub(crate) fn compute_bounds_for_values(
    values: &[f64],
    domain_hint: Option<crate::features::SignalDomain>,
    mode: &NormalizationMode,
) -> Bounds {
    match *mode {
        NormalizationMode::None => Bounds::unit(),
        NormalizationMode::Global => global_bounds(values),
        NormalizationMode::Robust => percentile_bounds(values, 5.0, 95.0),
        NormalizationMode::Fixed => match domain_hint {
            Some(domain) => Bounds::new(domain.min, domain.max),
            None => global_bounds(values),
        },
        NormalizationMode::Percentile { lo, hi } => {
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            percentile_bounds(values, lo, hi)
        }
    }
}

fn global_bounds(values: &[f64]) -> Bounds {
    let mm = min_max(values);
    if !mm.is_valid() {
        return Bounds::unit();
    }
    Bounds::new(mm.min, mm.max)
}

fn percentile_bounds(values: &[f64], lo: f64, hi: f64) -> Bounds {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Bounds::unit();
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    match (percentile(&sorted, lo), percentile(&sorted, hi)) {
        (Some(min), Some(max)) => Bounds::new(min, max),
        _ => Bounds::unit(),
    }
}

/// Map a value into the [0, 1] space of `bounds`
///
/// Values outside the bounds map outside [0, 1]; no clamping is applied.
#[inline]
pub fn normalize(value: f64, bounds: Bounds) -> f64 {
    let range = bounds.range();
    if range <= EPSILON {
        return 0.0;
    }
    (value - bounds.min) / range
}

/// Exact inverse of [`normalize`]
#[inline]
pub fn denormalize(value: f64, bounds: Bounds) -> f64 {
    bounds.min + value * bounds.range()
}

/// Caller-owned memo table for normalization bounds
///
/// Entries are keyed by the signal's generation and the mode. Signals are immutable
/// and every construction gets a fresh generation, so new values always miss the
/// cache and lookups cost O(1). Use [`BoundsCache::invalidate`] to drop entries for
/// a signal that is being replaced.
#[derive(Debug, Default)]
pub struct BoundsCache {
    entries: HashMap<(u64, ModeKey), Bounds>,
}

impl BoundsCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached bounds for `(signal, mode)`, computing them on a miss
    pub fn get_or_compute(&mut self, signal: &ContinuousSignal, mode: &NormalizationMode) -> Bounds {
        let key = (signal.generation(), mode.cache_key());
        *self
            .entries
            .entry(key)
            .or_insert_with(|| compute_bounds(signal, mode))
    }

    /// Drop every entry computed for this signal
    pub fn invalidate(&mut self, signal: &ContinuousSignal) {
        let generation = signal.generation();
        self.entries.retain(|(g, _), _| *g != generation);
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

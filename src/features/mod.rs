//! Feature extraction and event analysis modules
//!
//! This module contains the signal-level algorithms:
//! - Spectrogram and mel filterbank (STFT via rustfft)
//! - Onset envelope, spectral flux and beat-strength curves
//! - Peak picking (fixed, adaptive, hysteresis)
//! - Period estimation (tempo hypotheses, harmonic families)
//! - Beat tracking (phase search, beat grid)

pub mod beat_tracking;
pub mod extraction;
pub mod mel;
pub mod onset;
pub mod peak_picking;
pub mod period;
pub mod spectrogram;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub use spectrogram::Spectrogram2D;

/// Declared value domain of a signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalDomain {
    /// Lower end of the domain
    pub min: f64,
    /// Upper end of the domain
    pub max: f64,
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Continuous 1-D feature signal with explicit per-frame times
///
/// `times` is strictly increasing and has the same length as `values`. Signals are
/// immutable; re-analysis produces a new signal.
///
/// Every constructed signal gets a process-unique generation number. Clones share it,
/// since their contents cannot diverge. Equality compares contents only.
#[derive(Debug, Clone, Serialize)]
pub struct ContinuousSignal {
    times: Vec<f64>,
    values: Vec<f64>,
    domain_hint: Option<SignalDomain>,
    #[serde(skip)]
    generation: u64,
}

impl PartialEq for ContinuousSignal {
    fn eq(&self, other: &Self) -> bool {
        self.times == other.times && self.values == other.values && self.domain_hint == other.domain_hint
    }
}

impl ContinuousSignal {
    /// Build a signal, checking its invariants
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if lengths differ or times are not
    /// strictly increasing.
    pub fn new(
        times: Vec<f64>,
        values: Vec<f64>,
        domain_hint: Option<SignalDomain>,
    ) -> Result<Self, AnalysisError> {
        if times.len() != values.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "Signal has {} times but {} values",
                times.len(),
                values.len()
            )));
        }
        if let Some(i) = times.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(AnalysisError::InvalidInput(format!(
                "Signal times must be strictly increasing (index {}: {} -> {})",
                i + 1,
                times[i],
                times[i + 1]
            )));
        }
        Ok(Self {
            times,
            values,
            domain_hint,
            generation: next_generation(),
        })
    }

    /// Empty signal
    pub fn empty() -> Self {
        Self {
            times: Vec::new(),
            values: Vec::new(),
            domain_hint: None,
            generation: next_generation(),
        }
    }

    /// Frame times in seconds
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Frame values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Declared value domain, if any
    pub fn domain_hint(&self) -> Option<SignalDomain> {
        self.domain_hint
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the signal has no frames
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Identity of this signal's contents, used as the bounds-cache key
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_rejects_mismatched_lengths() {
        let err = ContinuousSignal::new(vec![0.0, 1.0], vec![1.0], None).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn test_signal_rejects_non_increasing_times() {
        assert!(ContinuousSignal::new(vec![0.0, 0.0], vec![1.0, 2.0], None).is_err());
        assert!(ContinuousSignal::new(vec![0.0, 1.0, 0.5], vec![1.0, 2.0, 3.0], None).is_err());
    }

    #[test]
    fn test_generation_identifies_constructions() {
        let a = ContinuousSignal::new(vec![0.0, 1.0], vec![1.0, 2.0], None).unwrap();
        let b = ContinuousSignal::new(vec![0.0, 1.0], vec![1.0, 2.0], None).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.generation(), b.generation());
        assert_eq!(a.clone().generation(), a.generation());
        assert_ne!(ContinuousSignal::empty().generation(), ContinuousSignal::empty().generation());
    }
}

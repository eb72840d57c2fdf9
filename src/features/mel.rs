//! Mel-scale conversion
//!
//! Maps between Hz, continuous mel-bin indices and normalized [0, 1] positions for a
//! fixed `(n_mels, f_min, f_max)` configuration. The mapping is a bijection on
//! `[f_min, f_max]` and is shared by the mel filterbank and band geometry.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Convert frequency in Hz to mel (HTK formula)
#[inline]
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert mel to frequency in Hz (HTK formula)
#[inline]
pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0f64.powf(mel / 2595.0) - 1.0)
}

/// Mel-bin layout used by feature extraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MelConversionConfig {
    n_mels: usize,
    f_min: f64,
    f_max: f64,
}

impl MelConversionConfig {
    /// Create a validated configuration
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidConfig` if `n_mels <= 1`, `f_min < 0`, a bound is
    /// not finite, or `f_min >= f_max`.
    pub fn new(n_mels: usize, f_min: f64, f_max: f64) -> Result<Self, AnalysisError> {
        let config = Self { n_mels, f_min, f_max };
        config.validate()?;
        Ok(config)
    }

    /// Re-check the invariants (used after deserialization)
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.n_mels <= 1 {
            return Err(AnalysisError::InvalidConfig(format!(
                "n_mels must be > 1, got {}",
                self.n_mels
            )));
        }
        if !self.f_min.is_finite() || !self.f_max.is_finite() || self.f_min < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "Mel frequency range must be finite and non-negative, got [{}, {}]",
                self.f_min, self.f_max
            )));
        }
        if self.f_min >= self.f_max {
            return Err(AnalysisError::InvalidConfig(format!(
                "f_min must be below f_max, got [{}, {}]",
                self.f_min, self.f_max
            )));
        }
        Ok(())
    }

    /// Number of mel bins
    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    /// Lowest mapped frequency
    pub fn f_min(&self) -> f64 {
        self.f_min
    }

    /// Highest mapped frequency
    pub fn f_max(&self) -> f64 {
        self.f_max
    }

    fn mel_span(&self) -> (f64, f64) {
        (hz_to_mel(self.f_min), hz_to_mel(self.f_max))
    }

    /// Continuous mel-bin index for a frequency
    ///
    /// `f_min` maps to 0 and `f_max` to `n_mels - 1`; frequencies outside the range
    /// extrapolate along the mel scale.
    pub fn hz_to_feature_index(&self, hz: f64) -> f64 {
        let (mel_lo, mel_hi) = self.mel_span();
        (hz_to_mel(hz) - mel_lo) / (mel_hi - mel_lo) * (self.n_mels - 1) as f64
    }

    /// Frequency at a continuous mel-bin index
    pub fn feature_index_to_hz(&self, index: f64) -> f64 {
        let (mel_lo, mel_hi) = self.mel_span();
        mel_to_hz(mel_lo + index / (self.n_mels - 1) as f64 * (mel_hi - mel_lo))
    }

    /// Mel-bin index for a normalized [0, 1] position (e.g. a pixel fraction)
    pub fn normalized_to_feature_index(&self, position: f64) -> f64 {
        position * (self.n_mels - 1) as f64
    }

    /// Normalized [0, 1] position of a mel-bin index
    pub fn feature_index_to_normalized(&self, index: f64) -> f64 {
        index / (self.n_mels - 1) as f64
    }

    /// The `n_mels + 2` triangle edges of the filterbank
    ///
    /// Filter `k` peaks at `feature_index_to_hz(k)` and reaches zero at the centers
    /// of its neighbours, so filterbank rows line up with feature indices.
    pub(crate) fn filter_edges_hz(&self) -> Vec<f64> {
        (0..self.n_mels + 2)
            .map(|i| self.feature_index_to_hz(i as f64 - 1.0))
            .collect()
    }
}

impl Default for MelConversionConfig {
    fn default() -> Self {
        Self {
            n_mels: 64,
            f_min: 30.0,
            f_max: 11_000.0,
        }
    }
}

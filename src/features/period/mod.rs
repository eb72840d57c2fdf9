//! Period estimation modules
//!
//! Convert beat-candidate times into tempo hypotheses:
//! - Inter-onset interval histogram over a BPM range
//! - Histogram peak refinement and evidence collection
//! - Harmonic family grouping (half/double/triple-time ambiguity)

pub mod harmonic;
pub mod tempo_hypotheses;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Evidence backing a tempo hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisEvidence {
    /// Inter-onset intervals whose tempo falls inside the hypothesis window
    pub supporting_interval_count: u32,
    /// Lowest and highest supporting tempo in BPM
    pub bin_range: (f64, f64),
}

/// Tempo hypothesis with harmonic family membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoHypothesis {
    /// Stable id, `"{family_id}@{ratio}"`
    pub id: String,
    /// Tempo in BPM
    pub bpm: f64,
    /// Confidence score (0.0-1.0)
    pub confidence: f64,
    /// Shared by every member of one harmonic family
    pub family_id: String,
    /// `bpm / root_bpm`; 1.0 for the family root
    pub harmonic_ratio: f64,
    /// Supporting evidence
    pub evidence: HypothesisEvidence,
}

impl TempoHypothesis {
    /// Whether this is the root of its family
    pub fn is_root(&self) -> bool {
        (self.harmonic_ratio - 1.0).abs() < 1e-9
    }

    /// Beat period in seconds
    pub fn period(&self) -> f64 {
        60.0 / self.bpm
    }
}

/// Tempo hypothesis engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoConfig {
    /// Minimum BPM to consider (default: 60.0)
    pub min_bpm: f64,

    /// Maximum BPM to consider (default: 200.0)
    pub max_bpm: f64,

    /// Histogram bin width in BPM (default: 1.0)
    pub bin_width_bpm: f64,

    /// Each candidate is paired with this many successors (default: 4)
    /// Spans above 1 let skipped beats still vote for the true period.
    pub max_interval_span: usize,

    /// Relative tempo tolerance for evidence windows and harmonic matching (default: 0.03)
    pub harmonic_tolerance: f64,

    /// Maximum number of families reported (default: 4)
    pub max_families: usize,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: 60.0,
            max_bpm: 200.0,
            bin_width_bpm: 1.0,
            max_interval_span: 4,
            harmonic_tolerance: 0.03,
            max_families: 4,
        }
    }
}

impl TempoConfig {
    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidConfig` describing the first violated constraint
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.min_bpm > 0.0) || !self.max_bpm.is_finite() || self.min_bpm >= self.max_bpm {
            return Err(AnalysisError::InvalidConfig(format!(
                "Invalid BPM range: [{:.1}, {:.1}]",
                self.min_bpm, self.max_bpm
            )));
        }
        if !(self.bin_width_bpm > 0.0) || self.bin_width_bpm > self.max_bpm - self.min_bpm {
            return Err(AnalysisError::InvalidConfig(format!(
                "Bin width must be positive and fit the BPM range, got {}",
                self.bin_width_bpm
            )));
        }
        if self.max_interval_span == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_interval_span must be >= 1".to_string(),
            ));
        }
        if !(self.harmonic_tolerance > 0.0 && self.harmonic_tolerance < 0.2) {
            return Err(AnalysisError::InvalidConfig(format!(
                "harmonic_tolerance must be in (0, 0.2), got {}",
                self.harmonic_tolerance
            )));
        }
        if self.max_families == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_families must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TempoConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let bad_range = TempoConfig {
            min_bpm: 150.0,
            max_bpm: 100.0,
            ..TempoConfig::default()
        };
        assert!(bad_range.validate().is_err());

        let negative = TempoConfig {
            min_bpm: -10.0,
            ..TempoConfig::default()
        };
        assert!(negative.validate().is_err());

        let zero_bin = TempoConfig {
            bin_width_bpm: 0.0,
            ..TempoConfig::default()
        };
        assert!(zero_bin.validate().is_err());

        let no_span = TempoConfig {
            max_interval_span: 0,
            ..TempoConfig::default()
        };
        assert!(no_span.validate().is_err());

        let wide_tolerance = TempoConfig {
            harmonic_tolerance: 0.5,
            ..TempoConfig::default()
        };
        assert!(wide_tolerance.validate().is_err());
    }
}

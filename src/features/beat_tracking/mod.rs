//! Beat tracking modules
//!
//! Turn a chosen tempo into a concrete beat grid:
//! - Phase search for a fixed period
//! - Beat grid generation, nudging and snapping

pub mod beat_grid;
pub mod phase;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Candidate phase offset for a fixed tempo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseHypothesis {
    /// Time of the first beat in seconds, in [0, period)
    pub phase_offset: f64,

    /// Alignment score (sum of per-candidate proximity weights)
    pub score: f64,
}

/// Ranked phase hypotheses with the one currently in use
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseHypotheses {
    /// Hypotheses by descending score
    pub hypotheses: Vec<PhaseHypothesis>,

    /// Index of the active hypothesis; 0 is the best-scoring one
    pub active_phase_index: usize,
}

impl PhaseHypotheses {
    /// The active hypothesis, if any
    pub fn active(&self) -> Option<&PhaseHypothesis> {
        self.hypotheses.get(self.active_phase_index)
    }

    /// Select a different hypothesis
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if `index` is out of range
    pub fn set_active(&mut self, index: usize) -> Result<(), AnalysisError> {
        if index >= self.hypotheses.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "Phase index {} out of range ({} hypotheses)",
                index,
                self.hypotheses.len()
            )));
        }
        self.active_phase_index = index;
        Ok(())
    }
}

/// Phase search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Offset sampling step in seconds (default: 0.001)
    /// Worst-case phase error is half a step.
    pub resolution_sec: f64,

    /// Proximity window as a fraction of the beat period (default: 0.1)
    pub tolerance_fraction: f64,

    /// Maximum number of hypotheses returned (default: 8)
    pub max_hypotheses: usize,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            resolution_sec: 0.001,
            tolerance_fraction: 0.1,
            max_hypotheses: 8,
        }
    }
}

impl PhaseConfig {
    /// Largest accepted sampling step (2 ms worst-case phase error)
    pub const MAX_RESOLUTION_SEC: f64 = 0.004;

    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidConfig` describing the first violated constraint
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.resolution_sec > 0.0 && self.resolution_sec <= Self::MAX_RESOLUTION_SEC) {
            return Err(AnalysisError::InvalidConfig(format!(
                "Phase resolution must be in (0, {}] s, got {}",
                Self::MAX_RESOLUTION_SEC,
                self.resolution_sec
            )));
        }
        if !(self.tolerance_fraction > 0.0 && self.tolerance_fraction <= 0.5) {
            return Err(AnalysisError::InvalidConfig(format!(
                "Phase tolerance fraction must be in (0, 0.5], got {}",
                self.tolerance_fraction
            )));
        }
        if self.max_hypotheses == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_hypotheses must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

//! Analysis result types

use serde::{Deserialize, Serialize};

use super::candidates::CandidateSet;
use crate::features::beat_tracking::beat_grid::BeatGrid;
use crate::features::beat_tracking::PhaseHypotheses;
use crate::features::period::harmonic::{group_by_family, TempoFamily};
use crate::features::period::TempoHypothesis;

/// Analysis flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisFlag {
    /// Beat-strength peak picking found fewer than two candidates
    NoBeatCandidates,
    /// No tempo hypothesis inside the configured BPM range
    NoTempo,
    /// Best members of the two strongest families are nearly equally confident
    MultimodalTempo,
}

/// Analysis metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Audio duration in seconds
    pub duration_seconds: f64,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Processing time in milliseconds
    pub processing_time_ms: f64,

    /// Algorithm version
    pub algorithm_version: String,

    /// Analysis flags
    pub flags: Vec<AnalysisFlag>,
}

impl AnalysisMetadata {
    /// Metadata for a source, stamped with the crate version
    pub fn new(duration_seconds: f64, sample_rate: u32) -> Self {
        Self {
            duration_seconds,
            sample_rate,
            processing_time_ms: 0.0,
            algorithm_version: env!("CARGO_PKG_VERSION").to_string(),
            flags: Vec::new(),
        }
    }
}

/// Complete analysis result
///
/// Produced whole by one analysis run; a re-run returns a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Candidate streams of the analyzed source
    pub candidates: CandidateSet,

    /// Tempo hypotheses, strongest family first
    pub tempo_hypotheses: Vec<TempoHypothesis>,

    /// Phase hypotheses for the first tempo hypothesis
    pub phase: PhaseHypotheses,

    /// Provisional (unlocked) grid from the first tempo and phase hypotheses
    pub beat_grid: Option<BeatGrid>,

    /// Analysis metadata
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    /// Highest-ranked tempo hypothesis
    pub fn top_hypothesis(&self) -> Option<&TempoHypothesis> {
        self.tempo_hypotheses.first()
    }

    /// Tempo hypotheses grouped by harmonic family
    pub fn families(&self) -> Vec<TempoFamily> {
        group_by_family(&self.tempo_hypotheses)
    }

    /// Beat times of the provisional grid over the whole source
    pub fn beat_times(&self) -> Vec<f64> {
        self.beat_grid
            .as_ref()
            .map(|grid| grid.beat_times(self.metadata.duration_seconds))
            .unwrap_or_default()
    }
}

//! Configuration parameters for audio analysis

use serde::{Deserialize, Serialize};

use crate::analysis::candidates::CandidateConfig;
use crate::error::AnalysisError;
use crate::features::beat_tracking::PhaseConfig;
use crate::features::mel::MelConversionConfig;
use crate::features::period::TempoConfig;

/// Analysis configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    // STFT parameters
    /// Frame size for STFT (default: 2048)
    pub frame_size: usize,

    /// Hop size for STFT (default: 512)
    pub hop_size: usize,

    // Mel layout
    /// Mel filterbank layout (default: 64 bands, 30 Hz - 11 kHz)
    pub mel: MelConversionConfig,

    // Beat strength
    /// Highest mel band center feeding the beat-strength curve (default: 250.0 Hz)
    pub beat_band_max_hz: f64,

    /// Moving-average length applied to beat strength, in frames (default: 3)
    pub beat_smoothing_frames: usize,

    // Candidate generation
    /// Onset candidates from the energy-flux envelope
    pub onset: CandidateConfig,

    /// Beat candidates from the beat-strength curve
    pub beat: CandidateConfig,

    /// Flux candidates from spectral flux
    pub flux: CandidateConfig,

    // Tempo and phase
    /// Tempo hypothesis engine
    pub tempo: TempoConfig,

    /// Phase search
    pub phase: PhaseConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            mel: MelConversionConfig::default(),
            beat_band_max_hz: 250.0,
            beat_smoothing_frames: 3,
            onset: CandidateConfig::onset_default(),
            beat: CandidateConfig::beat_default(),
            flux: CandidateConfig::flux_default(),
            tempo: TempoConfig::default(),
            phase: PhaseConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Validate every section
    ///
    /// Called at the entry points, before any per-sample work starts.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidConfig` describing the first violated constraint
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.frame_size < 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "Frame size must be >= 2, got {}",
                self.frame_size
            )));
        }
        if self.hop_size == 0 || self.hop_size > self.frame_size {
            return Err(AnalysisError::InvalidConfig(format!(
                "Hop size must be in [1, frame_size], got {} (frame_size={})",
                self.hop_size, self.frame_size
            )));
        }
        self.mel.validate()?;
        if !(self.beat_band_max_hz > 0.0 && self.beat_band_max_hz.is_finite()) {
            return Err(AnalysisError::InvalidConfig(format!(
                "beat_band_max_hz must be positive, got {}",
                self.beat_band_max_hz
            )));
        }
        self.onset.validate()?;
        self.beat.validate()?;
        self.flux.validate()?;
        self.tempo.validate()?;
        self.phase.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_sections_rejected() {
        let hop = AnalysisConfig {
            hop_size: 4096,
            ..AnalysisConfig::default()
        };
        assert!(matches!(hop.validate(), Err(AnalysisError::InvalidConfig(_))));

        let mut tempo = AnalysisConfig::default();
        tempo.tempo.max_bpm = 10.0;
        assert!(tempo.validate().is_err());

        let mut phase = AnalysisConfig::default();
        phase.phase.max_hypotheses = 0;
        assert!(phase.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = AnalysisConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}

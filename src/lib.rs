//! # Stratum MIR
//!
//! Music-information-retrieval analysis core: turns audio into reviewable candidate
//! events, ranked tempo hypotheses grouped into harmonic families, phase hypotheses
//! and a provisional beat grid.
//!
//! ## Features
//!
//! - **Candidate events**: onset, beat and flux streams from fixed, adaptive and
//!   hysteresis-gated peak picking
//! - **Tempo hypotheses**: inter-onset interval histogram with half/double/triple-time
//!   families surfaced instead of collapsed
//! - **Phase and beat grid**: deterministic phase search, pure beat-time generation
//! - **Geometry helpers**: composed signals with easing, time-varying frequency bands,
//!   mel-scale mapping
//!
//! Long computations take a [`CancellationToken`] and return an [`Outcome`]: either the
//! complete result or `Cancelled`, never a partial result.
//!
//! ## Quick Start
//!
//! ```no_run
//! use stratum_mir::{analyze_audio, AnalysisConfig, CancellationToken, Outcome, PcmBuffer};
//!
//! let buffer = PcmBuffer::mono(44100, vec![0.0f32; 44100 * 30])?;
//! let token = CancellationToken::new();
//!
//! if let Outcome::Completed(result) = analyze_audio(&buffer, &AnalysisConfig::default(), &token)? {
//!     for family in result.families() {
//!         println!("{}: root {:.2} BPM", family.family_id, family.root_bpm);
//!     }
//! }
//! # Ok::<(), stratum_mir::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Audio → Feature extraction → Candidate streams → Tempo hypotheses → Phase → Beat grid
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod bands;
pub mod cancel;
pub mod composition;
pub mod config;
pub mod display;
pub mod error;
pub mod features;
pub mod preprocessing;

use std::time::Instant;

// Re-export main types
pub use analysis::candidates::{CandidateGenerator, CandidateSet, CandidateStream, EventType, SparseEvent};
pub use analysis::result::{AnalysisFlag, AnalysisMetadata, AnalysisResult};
pub use cancel::{CancellationToken, Outcome};
pub use config::AnalysisConfig;
pub use error::AnalysisError;
pub use features::beat_tracking::beat_grid::{generate_beat_times, BeatGrid};
pub use features::beat_tracking::phase::compute_phase_hypotheses;
pub use features::beat_tracking::{PhaseHypotheses, PhaseHypothesis};
pub use features::period::harmonic::{family_id_to_hue, TempoFamily};
pub use features::period::tempo_hypotheses::compute_tempo_hypotheses;
pub use features::period::TempoHypothesis;
pub use features::ContinuousSignal;
pub use preprocessing::channel_mixer::{AudioBufferLike, PcmBuffer};

use cancel::try_outcome;
use features::extraction::extract_features;
use features::period::harmonic::group_by_family;

/// Source id under which [`analyze_audio`] registers its input
pub const DEFAULT_SOURCE_ID: &str = "mix";

/// Confidence ratio between the two strongest families above which tempo is ambiguous
const MULTIMODAL_RATIO: f64 = 0.9;

/// Main analysis function
///
/// Runs the whole pipeline on one buffer: feature extraction, candidate generation,
/// tempo hypotheses from the beat candidates, phase hypotheses for the top tempo and
/// a provisional beat grid.
///
/// # Arguments
///
/// * `buffer` - Audio source (any channel count)
/// * `config` - Analysis configuration parameters
/// * `token` - Cancellation token, checked between and within stages
///
/// # Returns
///
/// `Outcome::Completed` with the full result, or `Outcome::Cancelled`. Silent or very
/// short audio completes with empty candidate streams and no tempo.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidConfig` for an invalid configuration and
/// `AnalysisError::InvalidInput` for an unusable buffer
///
/// # Example
///
/// ```no_run
/// use stratum_mir::{analyze_audio, AnalysisConfig, CancellationToken, PcmBuffer};
///
/// let buffer = PcmBuffer::mono(44100, vec![0.0f32; 44100 * 30])?; // 30 seconds of silence
/// let outcome = analyze_audio(&buffer, &AnalysisConfig::default(), &CancellationToken::new())?;
/// # Ok::<(), stratum_mir::AnalysisError>(())
/// ```
pub fn analyze_audio<B: AudioBufferLike + ?Sized>(
    buffer: &B,
    config: &AnalysisConfig,
    token: &CancellationToken,
) -> Result<Outcome<AnalysisResult>, AnalysisError> {
    let start_time = Instant::now();
    config.validate()?;

    log::debug!(
        "Starting audio analysis: {} channels at {} Hz",
        buffer.number_of_channels(),
        buffer.sample_rate()
    );

    // Features
    let features = try_outcome!(extract_features(buffer, config, token)?);
    let mut metadata = AnalysisMetadata::new(features.duration_sec, features.sample_rate);

    // Candidates
    let mut generator = CandidateGenerator::new(config)?;
    generator.add_source(DEFAULT_SOURCE_ID, features);
    let candidates = try_outcome!(generator.generate_all(DEFAULT_SOURCE_ID, token)?);
    log::debug!(
        "Candidates: {} onset, {} beat, {} flux",
        candidates.onset.len(),
        candidates.beat.len(),
        candidates.flux.len()
    );

    // Tempo
    let beat_times = candidates.beat.times();
    if beat_times.len() < 2 {
        metadata.flags.push(AnalysisFlag::NoBeatCandidates);
    }
    let tempo_hypotheses = try_outcome!(compute_tempo_hypotheses(&beat_times, &config.tempo, token)?);

    // Phase and provisional grid
    let (phase, beat_grid) = match tempo_hypotheses.first() {
        Some(top) => {
            let phase = try_outcome!(compute_phase_hypotheses(
                top.bpm,
                &beat_times,
                &config.phase,
                token
            )?);
            let grid = phase
                .active()
                .map(|p| BeatGrid::provisional(top, p))
                .transpose()?;
            (phase, grid)
        }
        None => {
            metadata.flags.push(AnalysisFlag::NoTempo);
            (PhaseHypotheses::default(), None)
        }
    };

    let families = group_by_family(&tempo_hypotheses);
    if let [first, second, ..] = families.as_slice() {
        if second.max_confidence() >= MULTIMODAL_RATIO * first.max_confidence() {
            log::warn!(
                "Ambiguous tempo: families {} and {} are nearly equally confident",
                first.family_id,
                second.family_id
            );
            metadata.flags.push(AnalysisFlag::MultimodalTempo);
        }
    }

    let mut result = AnalysisResult {
        candidates,
        tempo_hypotheses,
        phase,
        beat_grid,
        metadata,
    };
    result.metadata.processing_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    match result.top_hypothesis() {
        Some(top) => log::debug!(
            "Analysis complete: {:.2} BPM ({:.2} confidence), {} families, {:.1} ms",
            top.bpm,
            top.confidence,
            families.len(),
            result.metadata.processing_time_ms
        ),
        None => log::debug!(
            "Analysis complete: no tempo, {:.1} ms",
            result.metadata.processing_time_ms
        ),
    }

    Ok(Outcome::Completed(result))
}

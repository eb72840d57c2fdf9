//! Candidate event generation
//!
//! Runs peak picking over the feature curves of a source to produce sparse candidate
//! streams: onsets from the energy-flux envelope, flux events from spectral flux, and
//! beat candidates from the beat-strength curve. Streams are regenerated wholesale;
//! nothing here mutates a previously returned stream.
//!
//! # Example
//!
//! ```no_run
//! use stratum_mir::analysis::candidates::{CandidateGenerator, EventType};
//! use stratum_mir::cancel::CancellationToken;
//! use stratum_mir::features::extraction::extract_features;
//! use stratum_mir::preprocessing::channel_mixer::PcmBuffer;
//! use stratum_mir::AnalysisConfig;
//!
//! let config = AnalysisConfig::default();
//! let buffer = PcmBuffer::mono(44100, vec![0.0f32; 44100 * 10])?;
//! let token = CancellationToken::new();
//!
//! let mut generator = CandidateGenerator::new(&config)?;
//! if let Some(features) = extract_features(&buffer, &config, &token)?.completed() {
//!     generator.add_source("mix", features);
//! }
//! let beats = generator.generate_candidates_for_type("mix", EventType::Beat, &token)?;
//! # Ok::<(), stratum_mir::AnalysisError>(())
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cancel::{CancellationToken, Outcome};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::features::extraction::FeatureSet;
use crate::features::peak_picking::{
    apply_hysteresis_gate, pick_peaks, pick_peaks_adaptive, HysteresisOptions, PeakPickingOptions,
    PeakSet,
};
use crate::features::ContinuousSignal;

/// Kind of candidate event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Note or percussion attacks
    Onset,
    /// Beat candidates
    Beat,
    /// Spectral-flux events
    Flux,
}

impl EventType {
    /// Every event type, in generation order
    pub const ALL: [EventType; 3] = [EventType::Onset, EventType::Beat, EventType::Flux];

    /// Lowercase name used in event ids
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Onset => "onset",
            EventType::Beat => "beat",
            EventType::Flux => "flux",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single candidate event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseEvent {
    /// `"{source}:{type}:{index}"`, stable for identical input
    pub id: String,
    /// Event time in seconds
    pub time: f64,
    /// Normalized strength in [0, 1]
    pub strength: f64,
}

/// Time-ordered candidate events of one type from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStream {
    /// Event type of every event in the stream
    pub event_type: EventType,
    /// Source the stream was generated from
    pub source_label: String,
    /// Events in time order
    pub events: Vec<SparseEvent>,
}

impl CandidateStream {
    fn from_peaks(source_label: &str, event_type: EventType, peaks: &PeakSet) -> Self {
        let events = peaks
            .iter()
            .enumerate()
            .map(|(index, (time, strength))| SparseEvent {
                id: format!("{}:{}:{}", source_label, event_type, index),
                time,
                strength: strength.clamp(0.0, 1.0),
            })
            .collect();
        Self {
            event_type,
            source_label: source_label.to_string(),
            events,
        }
    }

    /// Event times in seconds
    pub fn times(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.time).collect()
    }

    /// Events whose ids are in `ids`, in stream order; unknown ids are ignored
    pub fn events_by_ids<I, S>(&self, ids: I) -> Vec<&SparseEvent>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: HashSet<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        self.events
            .iter()
            .filter(|e| wanted.contains(&e.id))
            .collect()
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the stream has no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// One stream per event type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    /// Onset candidates
    pub onset: CandidateStream,
    /// Beat candidates
    pub beat: CandidateStream,
    /// Flux candidates
    pub flux: CandidateStream,
}

impl CandidateSet {
    /// Stream of a given type
    pub fn get(&self, event_type: EventType) -> &CandidateStream {
        match event_type {
            EventType::Onset => &self.onset,
            EventType::Beat => &self.beat,
            EventType::Flux => &self.flux,
        }
    }
}

/// Peak picker used for a stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakPickingMethod {
    /// Global normalized threshold
    Fixed(PeakPickingOptions),
    /// Local `mean + k * std` threshold over a window given in seconds
    Adaptive {
        /// Window length in seconds
        window_sec: f64,
        /// `threshold` is the standard-deviation multiplier
        options: PeakPickingOptions,
    },
}

/// Candidate generation settings for one event type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateConfig {
    /// Peak picker
    pub method: PeakPickingMethod,
    /// Optional hysteresis post-filter
    pub hysteresis: Option<HysteresisOptions>,
}

impl CandidateConfig {
    /// Onsets: adaptive threshold over half a second
    pub fn onset_default() -> Self {
        Self {
            method: PeakPickingMethod::Adaptive {
                window_sec: 0.5,
                options: PeakPickingOptions {
                    threshold: 1.5,
                    min_distance_sec: 0.05,
                    pre_max: 3,
                    post_max: 3,
                },
            },
            hysteresis: None,
        }
    }

    /// Beats: adaptive threshold over one second, hysteresis against sustained hits
    pub fn beat_default() -> Self {
        Self {
            method: PeakPickingMethod::Adaptive {
                window_sec: 1.0,
                options: PeakPickingOptions {
                    threshold: 0.5,
                    min_distance_sec: 0.2,
                    pre_max: 3,
                    post_max: 3,
                },
            },
            hysteresis: Some(HysteresisOptions {
                on_threshold: 0.2,
                off_threshold: 0.1,
                min_distance_sec: 0.2,
            }),
        }
    }

    /// Flux: fixed global threshold
    pub fn flux_default() -> Self {
        Self {
            method: PeakPickingMethod::Fixed(PeakPickingOptions::default()),
            hysteresis: None,
        }
    }

    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidConfig` describing the first violated constraint
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let options = match self.method {
            PeakPickingMethod::Fixed(options) => {
                if !(0.0..=1.0).contains(&options.threshold) {
                    return Err(AnalysisError::InvalidConfig(format!(
                        "Fixed peak threshold must be in [0, 1], got {}",
                        options.threshold
                    )));
                }
                options
            }
            PeakPickingMethod::Adaptive { window_sec, options } => {
                if !(window_sec > 0.0 && window_sec.is_finite()) {
                    return Err(AnalysisError::InvalidConfig(format!(
                        "Adaptive window must be positive, got {}",
                        window_sec
                    )));
                }
                if !(options.threshold >= 0.0 && options.threshold.is_finite()) {
                    return Err(AnalysisError::InvalidConfig(format!(
                        "Adaptive threshold multiplier must be >= 0, got {}",
                        options.threshold
                    )));
                }
                options
            }
        };
        if !(options.min_distance_sec >= 0.0 && options.min_distance_sec.is_finite()) {
            return Err(AnalysisError::InvalidConfig(format!(
                "min_distance_sec must be >= 0, got {}",
                options.min_distance_sec
            )));
        }
        if let Some(h) = self.hysteresis {
            let ordered = 0.0 <= h.off_threshold && h.off_threshold <= h.on_threshold && h.on_threshold <= 1.0;
            if !ordered || !(h.min_distance_sec >= 0.0) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "Hysteresis needs 0 <= off <= on <= 1 and min_distance >= 0 (got on={}, off={}, min_distance={})",
                    h.on_threshold, h.off_threshold, h.min_distance_sec
                )));
            }
        }
        Ok(())
    }
}

/// Generates candidate streams for registered sources
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    onset: CandidateConfig,
    beat: CandidateConfig,
    flux: CandidateConfig,
    sources: BTreeMap<String, FeatureSet>,
}

impl CandidateGenerator {
    /// Create a generator with the candidate settings of `config`
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidConfig` if any candidate setting is invalid
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        for candidate in [&config.onset, &config.beat, &config.flux] {
            candidate.validate()?;
        }
        Ok(Self {
            onset: config.onset,
            beat: config.beat,
            flux: config.flux,
            sources: BTreeMap::new(),
        })
    }

    /// Register (or replace) the features of a source
    ///
    /// Returns the features previously registered under `source_id`.
    pub fn add_source(&mut self, source_id: impl Into<String>, features: FeatureSet) -> Option<FeatureSet> {
        self.sources.insert(source_id.into(), features)
    }

    /// Drop a source
    pub fn remove_source(&mut self, source_id: &str) -> Option<FeatureSet> {
        self.sources.remove(source_id)
    }

    /// Registered source ids, sorted
    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Features of a source
    pub fn features(&self, source_id: &str) -> Option<&FeatureSet> {
        self.sources.get(source_id)
    }

    /// Generate the candidate stream of one type for a source
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if `source_id` is not registered
    pub fn generate_candidates_for_type(
        &self,
        source_id: &str,
        event_type: EventType,
        token: &CancellationToken,
    ) -> Result<Outcome<CandidateStream>, AnalysisError> {
        let features = self.lookup(source_id)?;
        Ok(self.generate_stream(source_id, features, event_type, token))
    }

    /// Generate all three streams for a source in parallel
    ///
    /// The set is returned only if every stream completed; a cancellation in any of
    /// them cancels the whole set.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if `source_id` is not registered
    pub fn generate_all(
        &self,
        source_id: &str,
        token: &CancellationToken,
    ) -> Result<Outcome<CandidateSet>, AnalysisError> {
        let features = self.lookup(source_id)?;

        let streams: Vec<Outcome<CandidateStream>> = EventType::ALL
            .par_iter()
            .map(|&event_type| self.generate_stream(source_id, features, event_type, token))
            .collect();

        let mut completed = Vec::with_capacity(streams.len());
        for stream in streams {
            match stream {
                Outcome::Completed(s) => completed.push(s),
                Outcome::Cancelled => return Ok(Outcome::Cancelled),
            }
        }
        let [onset, beat, flux]: [CandidateStream; 3] = completed
            .try_into()
            .map_err(|_| AnalysisError::ProcessingError("Missing candidate stream".to_string()))?;

        Ok(Outcome::Completed(CandidateSet { onset, beat, flux }))
    }

    fn lookup(&self, source_id: &str) -> Result<&FeatureSet, AnalysisError> {
        self.sources
            .get(source_id)
            .ok_or_else(|| AnalysisError::InvalidInput(format!("Unknown source '{}'", source_id)))
    }

    fn config_for(&self, event_type: EventType) -> &CandidateConfig {
        match event_type {
            EventType::Onset => &self.onset,
            EventType::Beat => &self.beat,
            EventType::Flux => &self.flux,
        }
    }

    fn generate_stream(
        &self,
        source_id: &str,
        features: &FeatureSet,
        event_type: EventType,
        token: &CancellationToken,
    ) -> Outcome<CandidateStream> {
        if token.is_cancelled() {
            return Outcome::Cancelled;
        }
        let signal = signal_for(features, event_type);
        let peaks = match pick_candidates(signal, self.config_for(event_type), token) {
            Outcome::Completed(peaks) => peaks,
            Outcome::Cancelled => return Outcome::Cancelled,
        };
        log::debug!(
            "Source '{}': {} {} candidates from {} frames",
            source_id,
            peaks.len(),
            event_type,
            signal.len()
        );
        Outcome::Completed(CandidateStream::from_peaks(source_id, event_type, &peaks))
    }
}

fn signal_for(features: &FeatureSet, event_type: EventType) -> &ContinuousSignal {
    match event_type {
        EventType::Onset => &features.onset_envelope,
        EventType::Beat => &features.beat_strength,
        EventType::Flux => &features.spectral_flux,
    }
}

/// Window length in samples for a duration, from the mean frame spacing
fn window_samples(times: &[f64], window_sec: f64) -> usize {
    if times.len() < 2 {
        return 1;
    }
    let spacing = (times[times.len() - 1] - times[0]) / (times.len() - 1) as f64;
    if spacing <= 0.0 {
        return 1;
    }
    ((window_sec / spacing).round() as usize).max(1)
}

fn pick_candidates(
    signal: &ContinuousSignal,
    config: &CandidateConfig,
    token: &CancellationToken,
) -> Outcome<PeakSet> {
    let (times, values) = (signal.times(), signal.values());
    let peaks = match config.method {
        PeakPickingMethod::Fixed(options) => pick_peaks(times, values, &options),
        PeakPickingMethod::Adaptive { window_sec, options } => {
            let window = window_samples(times, window_sec);
            match pick_peaks_adaptive(times, values, window, &options, false, token) {
                Outcome::Completed(adaptive) => adaptive.peaks,
                Outcome::Cancelled => return Outcome::Cancelled,
            }
        }
    };

    match config.hysteresis {
        Some(gate) => Outcome::Completed(apply_hysteresis_gate(
            times,
            values,
            &peaks.times,
            &peaks.strengths,
            &gate,
        )),
        None => Outcome::Completed(peaks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Spectrogram2D;

    fn pulse_signal(n: usize, hop: f64, every: usize) -> ContinuousSignal {
        let times = (0..n).map(|i| i as f64 * hop).collect();
        let values = (0..n)
            .map(|i| if i % every == 5 { 1.0 } else { 0.05 * ((i % 7) as f64 / 7.0) })
            .collect();
        ContinuousSignal::new(times, values, None).unwrap()
    }

    fn features() -> FeatureSet {
        let hop = 0.01;
        FeatureSet {
            sample_rate: 44100,
            duration_sec: 10.0,
            onset_envelope: pulse_signal(1000, hop, 25),
            spectral_flux: pulse_signal(1000, hop, 50),
            beat_strength: pulse_signal(1000, hop, 50),
            mel_spectrogram: Spectrogram2D {
                times: Vec::new(),
                frames: Vec::new(),
            },
        }
    }

    fn generator() -> CandidateGenerator {
        let mut generator = CandidateGenerator::new(&AnalysisConfig::default()).unwrap();
        generator.add_source("mix", features());
        generator
    }

    #[test]
    fn test_generate_beat_candidates() {
        let token = CancellationToken::new();
        let stream = generator()
            .generate_candidates_for_type("mix", EventType::Beat, &token)
            .unwrap()
            .completed()
            .unwrap();
        assert_eq!(stream.event_type, EventType::Beat);
        assert_eq!(stream.source_label, "mix");
        assert_eq!(stream.len(), 20);
        assert!((stream.events[0].time - 0.05).abs() < 1e-9);
        assert_eq!(stream.events[0].id, "mix:beat:0");
        assert!(stream.events.iter().all(|e| (0.0..=1.0).contains(&e.strength)));
        assert!(stream.times().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_unknown_source() {
        let result = generator().generate_candidates_for_type("drums", EventType::Onset, &CancellationToken::new());
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
        assert!(generator().generate_all("drums", &CancellationToken::new()).is_err());
    }

    #[test]
    fn test_generate_all_matches_single_streams() {
        let generator = generator();
        let token = CancellationToken::new();
        let set = generator.generate_all("mix", &token).unwrap().completed().unwrap();
        for event_type in EventType::ALL {
            let single = generator
                .generate_candidates_for_type("mix", event_type, &token)
                .unwrap()
                .completed()
                .unwrap();
            assert_eq!(set.get(event_type), &single);
        }
        assert_eq!(set.onset.len(), 40);
        assert_eq!(set.flux.len(), 20);
    }

    #[test]
    fn test_generate_all_cancelled_is_atomic() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = generator().generate_all("mix", &token).unwrap();
        assert!(outcome.is_cancelled());
    }

    #[test]
    fn test_events_by_ids() {
        let stream = generator()
            .generate_candidates_for_type("mix", EventType::Flux, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        let picked = stream.events_by_ids(["mix:flux:3", "mix:flux:1", "missing"]);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].id, "mix:flux:1");
        assert_eq!(picked[1].id, "mix:flux:3");
    }

    #[test]
    fn test_empty_signal_gives_empty_stream() {
        let mut generator = CandidateGenerator::new(&AnalysisConfig::default()).unwrap();
        let mut silent = features();
        silent.beat_strength = ContinuousSignal::empty();
        generator.add_source("silence", silent);
        let stream = generator
            .generate_candidates_for_type("silence", EventType::Beat, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        assert!(stream.is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(CandidateConfig::onset_default().validate().is_ok());
        assert!(CandidateConfig::beat_default().validate().is_ok());
        assert!(CandidateConfig::flux_default().validate().is_ok());

        let bad_fixed = CandidateConfig {
            method: PeakPickingMethod::Fixed(PeakPickingOptions {
                threshold: 1.5,
                ..PeakPickingOptions::default()
            }),
            hysteresis: None,
        };
        assert!(bad_fixed.validate().is_err());

        let bad_gate = CandidateConfig {
            hysteresis: Some(HysteresisOptions {
                on_threshold: 0.2,
                off_threshold: 0.5,
                min_distance_sec: 0.1,
            }),
            ..CandidateConfig::flux_default()
        };
        assert!(bad_gate.validate().is_err());
    }

    #[test]
    fn test_window_samples() {
        let times: Vec<f64> = (0..101).map(|i| i as f64 * 0.01).collect();
        assert_eq!(window_samples(&times, 0.5), 50);
        assert_eq!(window_samples(&times, 0.0), 1);
        assert_eq!(window_samples(&[0.0], 1.0), 1);
    }
}

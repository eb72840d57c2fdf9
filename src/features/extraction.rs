//! Feature extraction front end
//!
//! Mixes the input to mono and computes every curve the candidate generators read:
//! the energy-flux onset envelope, spectral flux and the low-band beat-strength curve.

use crate::cancel::{try_outcome, CancellationToken, Outcome};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::preprocessing::channel_mixer::{mix_to_mono, AudioBufferLike};

use super::onset::beat_strength::beat_strength;
use super::onset::energy_flux::onset_envelope;
use super::onset::spectral_flux::spectral_flux;
use super::spectrogram::{mel_spectrogram, stft_magnitudes};
use super::{ContinuousSignal, Spectrogram2D};

/// Feature curves of one audio source
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    /// Source sample rate in Hz
    pub sample_rate: u32,
    /// Source duration in seconds
    pub duration_sec: f64,
    /// RMS energy flux
    pub onset_envelope: ContinuousSignal,
    /// Half-wave rectified spectral flux
    pub spectral_flux: ContinuousSignal,
    /// Low-band beat strength
    pub beat_strength: ContinuousSignal,
    /// Mel spectrogram (also the display source)
    pub mel_spectrogram: Spectrogram2D,
}

/// Extract all feature curves from an audio buffer
///
/// # Arguments
///
/// * `buffer` - Planar audio source
/// * `config` - Analysis configuration (validated here)
/// * `token` - Checked between extraction stages and inside the STFT and mel projection
///
/// # Returns
///
/// `Outcome::Cancelled` if the token fired, otherwise the feature set. Audio shorter
/// than two frames yields empty curves.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidConfig` for an invalid configuration and
/// `AnalysisError::InvalidInput` for a buffer without channels or sample rate
pub fn extract_features<B: AudioBufferLike + ?Sized>(
    buffer: &B,
    config: &AnalysisConfig,
    token: &CancellationToken,
) -> Result<Outcome<FeatureSet>, AnalysisError> {
    config.validate()?;

    let sample_rate = buffer.sample_rate();
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("Invalid sample rate: 0".to_string()));
    }

    let nyquist = sample_rate as f64 / 2.0;
    if config.mel.f_max() > nyquist {
        log::warn!(
            "Mel f_max {:.0} Hz exceeds Nyquist {:.0} Hz; upper bands will be empty",
            config.mel.f_max(),
            nyquist
        );
    }

    let samples = mix_to_mono(buffer)?;
    let duration_sec = samples.len() as f64 / sample_rate as f64;
    log::debug!(
        "Extracting features: {} samples at {} Hz ({:.2}s)",
        samples.len(),
        sample_rate,
        duration_sec
    );

    let stages_cancelled = || {
        if token.is_cancelled() {
            log::debug!("Feature extraction cancelled");
            true
        } else {
            false
        }
    };

    let spectrogram = try_outcome!(stft_magnitudes(
        &samples,
        sample_rate,
        config.frame_size,
        config.hop_size,
        token
    )?);
    let mel = try_outcome!(mel_spectrogram(&spectrogram, sample_rate, &config.mel, token)?);
    let flux = spectral_flux(&spectrogram)?;
    drop(spectrogram);

    if stages_cancelled() {
        return Ok(Outcome::Cancelled);
    }
    let onset = onset_envelope(&samples, sample_rate, config.frame_size, config.hop_size)?;
    let beat = beat_strength(
        &mel,
        &config.mel,
        config.beat_band_max_hz,
        config.beat_smoothing_frames,
    )?;

    if stages_cancelled() {
        return Ok(Outcome::Cancelled);
    }

    log::debug!(
        "Features ready: {} onset, {} flux, {} beat-strength frames",
        onset.len(),
        flux.len(),
        beat.len()
    );

    Ok(Outcome::Completed(FeatureSet {
        sample_rate,
        duration_sec,
        onset_envelope: onset,
        spectral_flux: flux,
        beat_strength: beat,
        mel_spectrogram: mel,
    }))
}

//! Short-time Fourier transform and mel filterbank
//!
//! Frame `i` starts at sample `i * hop_size` and is stamped with time
//! `i * hop_size / sample_rate`. All downstream curves inherit these frame times, so
//! the framing here fixes the time base of every candidate event.
//!
//! # Example
//!
//! ```no_run
//! use stratum_mir::cancel::CancellationToken;
//! use stratum_mir::features::spectrogram::stft_magnitudes;
//!
//! let samples = vec![0.0f32; 44100 * 5];
//! if let Some(spec) = stft_magnitudes(&samples, 44100, 2048, 512, &CancellationToken::new())?.completed() {
//!     println!("{} frames x {} bins", spec.n_frames(), spec.n_bins());
//! }
//! # Ok::<(), stratum_mir::AnalysisError>(())
//! ```

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use super::mel::MelConversionConfig;
use crate::cancel::{CancellationToken, Outcome};
use crate::error::AnalysisError;

/// Frames between cancellation checks in the STFT and mel projection
pub const FRAME_CHECK_INTERVAL: usize = 64;

/// Time-frequency matrix with explicit per-frame times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrogram2D {
    /// Frame times in seconds
    pub times: Vec<f64>,
    /// One row of bin magnitudes per frame
    pub frames: Vec<Vec<f32>>,
}

impl Spectrogram2D {
    /// Number of frames
    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of bins per frame (0 for an empty spectrogram)
    pub fn n_bins(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }

    /// Whether there are no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Periodic Hann window
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}

/// Compute the magnitude spectrogram of mono samples
///
/// # Arguments
///
/// * `samples` - Mono audio samples
/// * `sample_rate` - Sample rate in Hz
/// * `frame_size` - FFT size (typically 2048)
/// * `hop_size` - Hop between frames (typically 512)
/// * `token` - Checked every [`FRAME_CHECK_INTERVAL`] frames
///
/// # Returns
///
/// Spectrogram with `frame_size / 2 + 1` bins per frame, or `Outcome::Cancelled`.
/// Audio shorter than one frame yields an empty spectrogram.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidConfig` if `sample_rate`, `frame_size` or
/// `hop_size` is zero.
pub fn stft_magnitudes(
    samples: &[f32],
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
    token: &CancellationToken,
) -> Result<Outcome<Spectrogram2D>, AnalysisError> {
    if sample_rate == 0 || frame_size == 0 || hop_size == 0 {
        return Err(AnalysisError::InvalidConfig(format!(
            "STFT needs non-zero sample rate, frame and hop (got {}, {}, {})",
            sample_rate, frame_size, hop_size
        )));
    }

    if samples.len() < frame_size {
        log::debug!(
            "Audio shorter than one frame ({} < {}), empty spectrogram",
            samples.len(),
            frame_size
        );
        return Ok(Outcome::Completed(Spectrogram2D {
            times: Vec::new(),
            frames: Vec::new(),
        }));
    }

    let n_frames = (samples.len() - frame_size) / hop_size + 1;
    let n_bins = frame_size / 2 + 1;

    log::debug!(
        "Computing STFT: {} samples, frame={}, hop={}, {} frames",
        samples.len(),
        frame_size,
        hop_size,
        n_frames
    );

    let window = hann_window(frame_size);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(frame_size);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); frame_size];

    let mut times = Vec::with_capacity(n_frames);
    let mut frames = Vec::with_capacity(n_frames);

    for i in 0..n_frames {
        if token.should_stop(i, FRAME_CHECK_INTERVAL) {
            log::debug!("STFT cancelled at frame {} of {}", i, n_frames);
            return Ok(Outcome::Cancelled);
        }
        let start = i * hop_size;
        for (slot, (&x, &w)) in buffer
            .iter_mut()
            .zip(samples[start..start + frame_size].iter().zip(window.iter()))
        {
            *slot = Complex::new(x * w, 0.0);
        }
        fft.process(&mut buffer);

        frames.push(buffer[..n_bins].iter().map(|c| c.norm()).collect());
        times.push(start as f64 / sample_rate as f64);
    }

    Ok(Outcome::Completed(Spectrogram2D { times, frames }))
}

/// Project a magnitude spectrogram onto a triangular mel filterbank
///
/// Output frames have `mel.n_mels()` bands and share the input frame times.
/// `frame_size` is inferred from the bin count. The token is checked every
/// [`FRAME_CHECK_INTERVAL`] frames.
pub fn mel_spectrogram(
    spectrogram: &Spectrogram2D,
    sample_rate: u32,
    mel: &MelConversionConfig,
    token: &CancellationToken,
) -> Result<Outcome<Spectrogram2D>, AnalysisError> {
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidConfig("Invalid sample rate: 0".to_string()));
    }
    if spectrogram.is_empty() {
        return Ok(Outcome::Completed(spectrogram.clone()));
    }

    let n_bins = spectrogram.n_bins();
    let frame_size = (n_bins - 1) * 2;
    let bin_hz = sample_rate as f64 / frame_size.max(1) as f64;
    let edges = mel.filter_edges_hz();

    // Dense weight matrix (n_mels x n_bins); filterbanks are small
    let mut weights = vec![vec![0.0f32; n_bins]; mel.n_mels()];
    for (band, row) in weights.iter_mut().enumerate() {
        let (lo, center, hi) = (edges[band], edges[band + 1], edges[band + 2]);
        for (bin, w) in row.iter_mut().enumerate() {
            let f = bin as f64 * bin_hz;
            let value = if f > lo && f <= center {
                (f - lo) / (center - lo)
            } else if f > center && f < hi {
                (hi - f) / (hi - center)
            } else {
                0.0
            };
            *w = value as f32;
        }
    }

    let mut frames = Vec::with_capacity(spectrogram.n_frames());
    for (i, frame) in spectrogram.frames.iter().enumerate() {
        if token.should_stop(i, FRAME_CHECK_INTERVAL) {
            log::debug!("Mel projection cancelled at frame {}", i);
            return Ok(Outcome::Cancelled);
        }
        frames.push(
            weights
                .iter()
                .map(|row| row.iter().zip(frame.iter()).map(|(w, m)| w * m).sum())
                .collect(),
        );
    }

    log::debug!(
        "Mel spectrogram: {} frames, {} bins -> {} mels",
        spectrogram.n_frames(),
        n_bins,
        mel.n_mels()
    );

    Ok(Outcome::Completed(Spectrogram2D {
        times: spectrogram.times.clone(),
        frames,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stft(samples: &[f32], sample_rate: u32, frame_size: usize, hop_size: usize) -> Spectrogram2D {
        stft_magnitudes(samples, sample_rate, frame_size, hop_size, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap()
    }

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_stft_invalid_params() {
        let token = CancellationToken::new();
        assert!(stft_magnitudes(&[0.0; 4096], 0, 1024, 256, &token).is_err());
        assert!(stft_magnitudes(&[0.0; 4096], 44100, 0, 256, &token).is_err());
        assert!(stft_magnitudes(&[0.0; 4096], 44100, 1024, 0, &token).is_err());
    }

    #[test]
    fn test_stft_short_input_is_empty() {
        let spec = stft(&[0.0; 100], 44100, 1024, 256);
        assert!(spec.is_empty());
    }

    #[test]
    fn test_stft_frame_times_and_shape() {
        let samples = vec![0.0f32; 44100];
        let spec = stft(&samples, 44100, 1024, 512);
        assert_eq!(spec.n_frames(), (44100 - 1024) / 512 + 1);
        assert_eq!(spec.n_bins(), 513);
        assert_eq!(spec.times[0], 0.0);
        assert!((spec.times[1] - 512.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn test_stft_sine_peak_bin() {
        let sr = 8000;
        let samples = sine(1000.0, sr, 1.0);
        let spec = stft(&samples, sr, 1024, 512);
        let frame = &spec.frames[2];
        let peak_bin = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        // 1000 Hz at 8000/1024 Hz per bin = bin 128
        assert_eq!(peak_bin, 128);
    }

    #[test]
    fn test_mel_spectrogram_energy_in_right_band() {
        let sr = 16000;
        let samples = sine(500.0, sr, 1.0);
        let spec = stft(&samples, sr, 1024, 512);
        let mel = MelConversionConfig::new(32, 0.0, 8000.0).unwrap();
        let mel_spec = mel_spectrogram(&spec, sr, &mel, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();

        assert_eq!(mel_spec.n_bins(), 32);
        assert_eq!(mel_spec.times, spec.times);

        let frame = &mel_spec.frames[3];
        let peak_band = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let expected = mel.hz_to_feature_index(500.0);
        assert!((peak_band as f64 - expected).abs() <= 2.0);
    }

    #[test]
    fn test_stft_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();
        let samples = sine(440.0, 8000, 30.0);
        let outcome = stft_magnitudes(&samples, 8000, 256, 128, &token).unwrap();
        assert!(outcome.is_cancelled());
    }

    #[test]
    fn test_mel_projection_cancelled() {
        let spec = stft(&sine(440.0, 16000, 2.0), 16000, 1024, 512);
        let mel = MelConversionConfig::new(32, 0.0, 8000.0).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(mel_spectrogram(&spec, 16000, &mel, &token).unwrap().is_cancelled());
        assert!(!mel_spectrogram(&spec, 16000, &mel, &CancellationToken::new())
            .unwrap()
            .is_cancelled());
    }

    #[test]
    fn test_stft_answers_cancel_from_another_thread() {
        let samples = vec![0.1f32; 44100 * 600];
        let token = CancellationToken::new();
        let remote = token.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            remote.cancel();
        });
        let outcome = stft_magnitudes(&samples, 44100, 2048, 512, &token).unwrap();
        canceller.join().unwrap();
        assert!(outcome.is_cancelled());
    }
}

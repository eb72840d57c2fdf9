//! Energy flux onset envelope
//!
//! Measures frame-to-frame increases in RMS energy.
//!
//! Algorithm:
//! 1. Divide audio into overlapping frames (frame_size, hop_size)
//! 2. Compute RMS energy per frame
//! 3. Compute energy derivative (flux): E_flux[n] = max(0, E[n] - E[n-1])
//! 4. Stamp flux value n with the start time of frame n
//!
//! The envelope is a continuous signal; onsets are selected from it later by the
//! peak pickers.
//!
//! # Example
//!
//! ```no_run
//! use stratum_mir::features::onset::energy_flux::onset_envelope;
//!
//! let samples = vec![0.0f32; 44100 * 30]; // 30 seconds of audio
//! let envelope = onset_envelope(&samples, 44100, 2048, 512)?;
//! println!("{} envelope frames", envelope.len());
//! # Ok::<(), stratum_mir::AnalysisError>(())
//! ```

use crate::error::AnalysisError;
use crate::features::ContinuousSignal;

/// Compute the energy flux onset envelope
///
/// # Reference
///
/// Bello, J. P., Daudet, L., Abdallah, S., Duxbury, C., Davies, M., & Sandler, M. B. (2005).
/// A Tutorial on Onset Detection in Music Signals.
/// *IEEE Transactions on Speech and Audio Processing*, 13(5), 1035-1047.
///
/// # Arguments
///
/// * `samples` - Audio samples (mono, normalized to [-1.0, 1.0])
/// * `sample_rate` - Sample rate in Hz
/// * `frame_size` - Frame size for analysis (typically 2048)
/// * `hop_size` - Hop size between frames (typically 512)
///
/// # Returns
///
/// Envelope with one value per frame transition (frames 1..n). Audio shorter than two
/// frames gives an empty signal.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidConfig` if any parameter is zero
pub fn onset_envelope(
    samples: &[f32],
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
) -> Result<ContinuousSignal, AnalysisError> {
    if sample_rate == 0 || frame_size == 0 || hop_size == 0 {
        return Err(AnalysisError::InvalidConfig(format!(
            "Energy flux needs non-zero sample rate, frame and hop (got {}, {}, {})",
            sample_rate, frame_size, hop_size
        )));
    }

    if frame_size > samples.len() {
        log::debug!(
            "Frame size ({}) larger than audio length ({}), empty envelope",
            frame_size,
            samples.len()
        );
        return Ok(ContinuousSignal::empty());
    }

    let num_frames = (samples.len() - frame_size) / hop_size + 1;
    if num_frames < 2 {
        // Need at least 2 frames to compute flux
        return Ok(ContinuousSignal::empty());
    }

    log::debug!(
        "Computing energy flux envelope: {} samples, frame={}, hop={}, {} frames",
        samples.len(),
        frame_size,
        hop_size,
        num_frames
    );

    // RMS energy per frame, accumulated in f64
    let frame_energies: Vec<f64> = (0..num_frames)
        .map(|i| {
            let start = i * hop_size;
            let frame = &samples[start..start + frame_size];
            let sum_sq: f64 = frame.iter().map(|&x| (x as f64) * (x as f64)).sum();
            (sum_sq / frame_size as f64).sqrt()
        })
        .collect();

    let mut times = Vec::with_capacity(num_frames - 1);
    let mut values = Vec::with_capacity(num_frames - 1);
    for i in 1..num_frames {
        times.push((i * hop_size) as f64 / sample_rate as f64);
        values.push((frame_energies[i] - frame_energies[i - 1]).max(0.0));
    }

    ContinuousSignal::new(times, values, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_params() {
        let samples = vec![0.0f32; 4096];
        assert!(onset_envelope(&samples, 0, 1024, 256).is_err());
        assert!(onset_envelope(&samples, 44100, 0, 256).is_err());
        assert!(onset_envelope(&samples, 44100, 1024, 0).is_err());
    }

    #[test]
    fn test_short_audio_is_empty() {
        let env = onset_envelope(&[0.1f32; 500], 44100, 1024, 256).unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn test_silence_is_flat_zero() {
        let env = onset_envelope(&vec![0.0f32; 44100], 44100, 1024, 512).unwrap();
        assert!(!env.is_empty());
        assert!(env.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_envelope_peaks_at_attack() {
        // Silence then a burst starting at sample 8192
        let mut samples = vec![0.0f32; 16384];
        for s in samples.iter_mut().skip(8192) {
            *s = 0.8;
        }
        let env = onset_envelope(&samples, 8192, 1024, 512).unwrap();

        let (peak_idx, _) = env
            .values()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        let peak_time = env.times()[peak_idx];
        assert!(peak_time > 0.85 && peak_time <= 1.0, "peak at {}", peak_time);
        // Flux is half-wave rectified
        assert!(env.values().iter().all(|&v| v >= 0.0));
    }
}

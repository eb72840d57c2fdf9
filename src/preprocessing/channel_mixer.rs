//! Channel mixing utilities (multi-channel to mono conversion)
//!
//! Audio arrives from the host as an [`AudioBufferLike`]: a sample rate, a channel
//! count and one planar `f32` slice per channel. Analysis runs on the mono average.

use crate::error::AnalysisError;

/// Planar PCM audio source
pub trait AudioBufferLike {
    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Number of channels
    fn number_of_channels(&self) -> usize;

    /// Samples of one channel, or `None` if `channel` is out of range
    fn channel_data(&self, channel: usize) -> Option<&[f32]>;
}

/// Owned planar PCM buffer
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Create a buffer from planar channel data
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if the sample rate is zero, there are no
    /// channels, or channels differ in length.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidInput("Invalid sample rate: 0".to_string()));
        }
        let Some(first) = channels.first() else {
            return Err(AnalysisError::InvalidInput("Buffer has no channels".to_string()));
        };
        let len = first.len();
        if let Some(ch) = channels.iter().position(|c| c.len() != len) {
            return Err(AnalysisError::InvalidInput(format!(
                "Channel {} has {} samples, channel 0 has {}",
                ch,
                channels[ch].len(),
                len
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Mono buffer
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Result<Self, AnalysisError> {
        Self::new(sample_rate, vec![samples])
    }

    /// Build from interleaved samples (e.g. decoded WAV data)
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: usize,
        interleaved: &[f32],
    ) -> Result<Self, AnalysisError> {
        if channel_count == 0 {
            return Err(AnalysisError::InvalidInput("Channel count must be > 0".to_string()));
        }
        let frames = interleaved.len() / channel_count;
        let channels = (0..channel_count)
            .map(|ch| (0..frames).map(|f| interleaved[f * channel_count + ch]).collect())
            .collect();
        Self::new(sample_rate, channels)
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.channels[0].len() as f64 / self.sample_rate as f64
    }
}

impl AudioBufferLike for PcmBuffer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    fn channel_data(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }
}

/// Average all channels into one mono signal
///
/// Channels of unequal length are mixed over the shortest one.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if the buffer has no readable channels
pub fn mix_to_mono<B: AudioBufferLike + ?Sized>(buffer: &B) -> Result<Vec<f32>, AnalysisError> {
    let channels: Vec<&[f32]> = (0..buffer.number_of_channels())
        .filter_map(|ch| buffer.channel_data(ch))
        .collect();

    if channels.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "Audio buffer has no channels".to_string(),
        ));
    }

    if channels.len() == 1 {
        return Ok(channels[0].to_vec());
    }

    let len = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    let scale = 1.0 / channels.len() as f32;

    log::debug!("Mixing {} channels x {} samples to mono", channels.len(), len);

    Ok((0..len)
        .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() * scale)
        .collect())
}

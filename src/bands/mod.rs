//! Frequency band geometry
//!
//! A band is a time-varying frequency range drawn over the spectrogram. Its shape is a
//! list of time-ordered, non-overlapping segments; within a segment the lower and
//! upper edges move linearly from their start to their end values. Segment boundary
//! times are the band's keyframes.
//!
//! All edit operations return a new band and leave the input untouched. An edit that
//! does not apply (no keyframe at the given time, split point on a boundary, ...)
//! returns an unchanged copy.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::features::mel::MelConversionConfig;

/// Keyframe times closer than this are the same keyframe
pub const KEYFRAME_EPSILON: f64 = 1e-9;

/// Shortest segment a keyframe move may leave behind
pub const MIN_SEGMENT_SEC: f64 = 1e-3;

/// Time-bounded trapezoid in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSegment {
    /// Segment start in seconds
    pub start_time_sec: f64,
    /// Segment end in seconds
    pub end_time_sec: f64,
    /// Lower edge at the start
    pub low_hz_start: f64,
    /// Lower edge at the end
    pub low_hz_end: f64,
    /// Upper edge at the start
    pub high_hz_start: f64,
    /// Upper edge at the end
    pub high_hz_end: f64,
}

impl BandSegment {
    /// Segment with the same bounds at both ends
    pub fn constant(start_time_sec: f64, end_time_sec: f64, low_hz: f64, high_hz: f64) -> Self {
        Self {
            start_time_sec,
            end_time_sec,
            low_hz_start: low_hz,
            low_hz_end: low_hz,
            high_hz_start: high_hz,
            high_hz_end: high_hz,
        }
    }

    /// Whether `time_sec` lies within the segment, boundaries included
    pub fn contains(&self, time_sec: f64) -> bool {
        time_sec >= self.start_time_sec && time_sec <= self.end_time_sec
    }

    /// Interpolated bounds at `time_sec` (clamped to the segment)
    pub fn bounds_at(&self, time_sec: f64) -> FrequencyBounds {
        let span = self.end_time_sec - self.start_time_sec;
        let t = if span > 0.0 {
            ((time_sec - self.start_time_sec) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        FrequencyBounds {
            low_hz: lerp(self.low_hz_start, self.low_hz_end, t),
            high_hz: lerp(self.high_hz_start, self.high_hz_end, t),
        }
    }

    fn validate(&self, index: usize) -> Result<(), AnalysisError> {
        let values = [
            self.start_time_sec,
            self.end_time_sec,
            self.low_hz_start,
            self.low_hz_end,
            self.high_hz_start,
            self.high_hz_end,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidInput(format!(
                "Segment {} has non-finite values",
                index
            )));
        }
        if self.start_time_sec >= self.end_time_sec {
            return Err(AnalysisError::InvalidInput(format!(
                "Segment {} is empty or reversed: [{}, {}]",
                index, self.start_time_sec, self.end_time_sec
            )));
        }
        validate_edge(self.low_hz_start, self.high_hz_start)
            .and_then(|_| validate_edge(self.low_hz_end, self.high_hz_end))
            .map_err(|msg| AnalysisError::InvalidInput(format!("Segment {}: {}", index, msg)))
    }
}

/// Lower and upper frequency at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBounds {
    /// Lower edge in Hz
    pub low_hz: f64,
    /// Upper edge in Hz
    pub high_hz: f64,
}

/// Named, time-varying frequency band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    /// Stable identifier
    pub id: String,
    /// Display label
    pub label: String,
    /// Segments in time order
    pub frequency_shape: Vec<BandSegment>,
    /// Whether the band is active
    pub enabled: bool,
    /// Position in band lists
    pub sort_order: i32,
}

impl FrequencyBand {
    /// Create an enabled band
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if a segment is empty, reversed or has
    /// `low_hz >= high_hz`, or if segments overlap or are out of order
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        frequency_shape: Vec<BandSegment>,
    ) -> Result<Self, AnalysisError> {
        let band = Self {
            id: id.into(),
            label: label.into(),
            frequency_shape,
            enabled: true,
            sort_order: 0,
        };
        band.validate()?;
        Ok(band)
    }

    /// Band with a single constant segment
    pub fn constant(
        id: impl Into<String>,
        label: impl Into<String>,
        start_time_sec: f64,
        end_time_sec: f64,
        low_hz: f64,
        high_hz: f64,
    ) -> Result<Self, AnalysisError> {
        Self::new(
            id,
            label,
            vec![BandSegment::constant(start_time_sec, end_time_sec, low_hz, high_hz)],
        )
    }

    /// Copy with a different sort order
    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Check the shape invariants
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (i, segment) in self.frequency_shape.iter().enumerate() {
            segment.validate(i)?;
        }
        if let Some(i) = self
            .frequency_shape
            .windows(2)
            .position(|w| w[0].end_time_sec > w[1].start_time_sec + KEYFRAME_EPSILON)
        {
            return Err(AnalysisError::InvalidInput(format!(
                "Segments {} and {} overlap or are out of order",
                i,
                i + 1
            )));
        }
        Ok(())
    }
}

fn validate_edge(low_hz: f64, high_hz: f64) -> Result<(), String> {
    if low_hz < 0.0 {
        return Err(format!("negative lower edge {}", low_hz));
    }
    if low_hz >= high_hz {
        return Err(format!("lower edge {} not below upper edge {}", low_hz, high_hz));
    }
    Ok(())
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn same_time(a: f64, b: f64) -> bool {
    (a - b).abs() <= KEYFRAME_EPSILON
}

/// Band bounds at `time_sec`, or `None` where the band is undefined
///
/// At a shared boundary the earlier segment answers; both agree when the shape is
/// continuous there.
pub fn frequency_bounds_at(band: &FrequencyBand, time_sec: f64) -> Option<FrequencyBounds> {
    band.frequency_shape
        .iter()
        .find(|s| s.contains(time_sec))
        .map(|s| s.bounds_at(time_sec))
}

/// Sorted, de-duplicated segment boundary times
pub fn keyframe_times(band: &FrequencyBand) -> Vec<f64> {
    let mut times: Vec<f64> = band
        .frequency_shape
        .iter()
        .flat_map(|s| [s.start_time_sec, s.end_time_sec])
        .collect();
    times.sort_by(f64::total_cmp);
    times.dedup_by(|a, b| same_time(*a, *b));
    times
}

/// Split the segment containing `time_sec` into two at that time
///
/// The new boundary takes the interpolated bounds, so the shape is unchanged. Times on
/// an existing boundary or outside every segment leave the band as it is.
pub fn split_band_segment_at(band: &FrequencyBand, time_sec: f64) -> FrequencyBand {
    let mut result = band.clone();
    let Some(idx) = band.frequency_shape.iter().position(|s| {
        time_sec > s.start_time_sec + KEYFRAME_EPSILON && time_sec < s.end_time_sec - KEYFRAME_EPSILON
    }) else {
        return result;
    };

    let segment = band.frequency_shape[idx];
    let at = segment.bounds_at(time_sec);
    let head = BandSegment {
        end_time_sec: time_sec,
        low_hz_end: at.low_hz,
        high_hz_end: at.high_hz,
        ..segment
    };
    let tail = BandSegment {
        start_time_sec: time_sec,
        low_hz_start: at.low_hz,
        high_hz_start: at.high_hz,
        ..segment
    };

    log::debug!("Band '{}': split segment {} at {:.3}s", band.id, idx, time_sec);
    result.frequency_shape[idx] = head;
    result.frequency_shape.insert(idx + 1, tail);
    result
}

/// Move the keyframe at `old_time` to `new_time`
///
/// The move is clamped so the keyframe stays at least [`MIN_SEGMENT_SEC`] away from
/// its neighbouring keyframes (and at or after 0 for the first one). Bounds at the
/// keyframe keep their Hz values; the adjoining segments stretch.
pub fn move_keyframe_time(band: &FrequencyBand, old_time: f64, new_time: f64) -> FrequencyBand {
    let keyframes = keyframe_times(band);
    let Some(idx) = keyframes.iter().position(|&k| same_time(k, old_time)) else {
        return band.clone();
    };
    if !new_time.is_finite() {
        return band.clone();
    }

    let lower = if idx > 0 {
        keyframes[idx - 1] + MIN_SEGMENT_SEC
    } else {
        0.0_f64.min(keyframes[idx])
    };
    let upper = keyframes
        .get(idx + 1)
        .map_or(f64::INFINITY, |next| next - MIN_SEGMENT_SEC);
    // Neighbours closer than two minimum spans: the keyframe stays put
    let target = if lower > upper {
        keyframes[idx]
    } else {
        new_time.clamp(lower, upper)
    };

    let mut result = band.clone();
    for segment in result.frequency_shape.iter_mut() {
        if same_time(segment.start_time_sec, keyframes[idx]) {
            segment.start_time_sec = target;
        }
        if same_time(segment.end_time_sec, keyframes[idx]) {
            segment.end_time_sec = target;
        }
    }
    log::debug!(
        "Band '{}': moved keyframe {:.3}s -> {:.3}s (requested {:.3}s)",
        band.id,
        keyframes[idx],
        target,
        new_time
    );
    result
}

/// Remove a shared keyframe by merging the two segments that meet there
///
/// The merged segment runs from the first segment's start bounds to the second's end
/// bounds. Keyframes at the outer edge of the shape or next to a gap are not shared;
/// the band is returned unchanged for them.
pub fn remove_keyframe(band: &FrequencyBand, time_sec: f64) -> FrequencyBand {
    let shape = &band.frequency_shape;
    let Some(idx) = shape.windows(2).position(|w| {
        same_time(w[0].end_time_sec, time_sec) && same_time(w[1].start_time_sec, time_sec)
    }) else {
        return band.clone();
    };

    let (first, second) = (shape[idx], shape[idx + 1]);
    let merged = BandSegment {
        start_time_sec: first.start_time_sec,
        end_time_sec: second.end_time_sec,
        low_hz_start: first.low_hz_start,
        low_hz_end: second.low_hz_end,
        high_hz_start: first.high_hz_start,
        high_hz_end: second.high_hz_end,
    };

    let mut result = band.clone();
    result.frequency_shape[idx] = merged;
    result.frequency_shape.remove(idx + 1);
    result
}

/// Set the bounds at a keyframe, updating every segment edge that meets there
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if the bounds are non-finite, negative or
/// `low_hz >= high_hz`
pub fn set_keyframe_bounds(
    band: &FrequencyBand,
    time_sec: f64,
    low_hz: f64,
    high_hz: f64,
) -> Result<FrequencyBand, AnalysisError> {
    if !(low_hz.is_finite() && high_hz.is_finite()) {
        return Err(AnalysisError::InvalidInput(format!(
            "Non-finite band bounds: [{}, {}]",
            low_hz, high_hz
        )));
    }
    validate_edge(low_hz, high_hz).map_err(AnalysisError::InvalidInput)?;

    let mut result = band.clone();
    for segment in result.frequency_shape.iter_mut() {
        if same_time(segment.start_time_sec, time_sec) {
            segment.low_hz_start = low_hz;
            segment.high_hz_start = high_hz;
        }
        if same_time(segment.end_time_sec, time_sec) {
            segment.low_hz_end = low_hz;
            segment.high_hz_end = high_hz;
        }
    }
    Ok(result)
}

/// Band bounds at `time_sec` as continuous mel-bin indices `(low, high)`
pub fn band_feature_range_at(
    band: &FrequencyBand,
    time_sec: f64,
    mel: &MelConversionConfig,
) -> Option<(f64, f64)> {
    frequency_bounds_at(band, time_sec)
        .map(|b| (mel.hz_to_feature_index(b.low_hz), mel.hz_to_feature_index(b.high_hz)))
}

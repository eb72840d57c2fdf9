//! Input preparation and normalization
//!
//! - Channel mixing (multi-channel buffers to mono)
//! - Statistics and value normalization (min/max, percentiles, bounds cache)

pub mod channel_mixer;
pub mod normalization;

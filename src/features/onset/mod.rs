//! Onset-strength curves
//!
//! Continuous curves that peak at musical attacks:
//! - Energy flux (RMS energy increase, onset envelope)
//! - Spectral flux (rectified spectral change)
//! - Beat strength (log-compressed low-band mel flux)
//! - Adaptive local statistics used for thresholding them

pub mod beat_strength;
pub mod energy_flux;
pub mod spectral_flux;
pub mod threshold;

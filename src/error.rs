//! Error types for the analysis core
//!
//! Degenerate input (empty, constant or mismatched arrays) is never an error: the
//! algorithms return empty results for it. Cancellation is not an error either, see
//! [`crate::cancel::Outcome`].

use std::fmt;

/// Errors that can occur during analysis
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Invalid input parameters (unknown source id, malformed signal, ...)
    InvalidInput(String),

    /// Invalid configuration, reported where the configuration is validated
    InvalidConfig(String),

    /// Processing error during analysis
    ProcessingError(String),

    /// Numerical error (overflow, non-finite intermediate, etc.)
    NumericalError(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AnalysisError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            AnalysisError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            AnalysisError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AnalysisError::InvalidConfig("n_mels must be > 1".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: n_mels must be > 1");

        let err = AnalysisError::InvalidInput("unknown source 'drums'".to_string());
        assert!(err.to_string().starts_with("Invalid input"));
    }
}

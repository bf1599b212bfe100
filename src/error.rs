//! Error handling for namrig
//!
//! Construction failures are fatal to the instance being built. Processing
//! failures are raised before any state is touched, so the next good call
//! behaves as if the bad one never happened.

use thiserror::Error;

/// Result type alias for namrig operations
pub type Result<T> = std::result::Result<T, RigError>;

/// Main error type for namrig operations
#[derive(Error, Debug)]
pub enum RigError {
    // Load Errors
    #[error("Failed to load {source_name}: {reason}")]
    Load { source_name: String, reason: String },

    // Lifecycle Errors
    #[error("Unsupported sample rate: {requested} Hz (expected {expected} Hz)")]
    UnsupportedSampleRate { requested: f64, expected: f64 },

    // Processing Errors
    #[error("Invalid buffer: {reason}")]
    InvalidBuffer { reason: String },

    #[error("Stage not found: {stage_id}")]
    StageNotFound { stage_id: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RigError {
    /// Shorthand for a load failure
    pub fn load(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        RigError::Load {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Attribute a load failure to a concrete source (file name, "bytes")
    ///
    /// Other variants are returned unchanged.
    pub fn with_source_name(self, name: impl Into<String>) -> Self {
        match self {
            RigError::Load { reason, .. } => RigError::Load {
                source_name: name.into(),
                reason,
            },
            other => other,
        }
    }

    /// Shorthand for a rejected buffer
    pub fn invalid_buffer(reason: impl Into<String>) -> Self {
        RigError::InvalidBuffer {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RigError::Load { .. } => "LOAD_ERROR",
            RigError::UnsupportedSampleRate { .. } => "UNSUPPORTED_SAMPLE_RATE",
            RigError::InvalidBuffer { .. } => "INVALID_BUFFER",
            RigError::StageNotFound { .. } => "STAGE_NOT_FOUND",
            RigError::Io(_) => "IO_ERROR",
            RigError::Wav(_) => "WAV_ERROR",
            RigError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the caller can keep using the instance that raised this error
    ///
    /// Buffer and sample-rate rejections leave the processor untouched.
    /// Load failures never produce an instance to keep using.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RigError::InvalidBuffer { .. }
                | RigError::UnsupportedSampleRate { .. }
                | RigError::StageNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = RigError::load("amp.nam", "empty weights");
        assert_eq!(err.error_code(), "LOAD_ERROR");
        assert_eq!(err.to_string(), "Failed to load amp.nam: empty weights");
    }

    #[test]
    fn test_recoverability() {
        assert!(RigError::invalid_buffer("length mismatch").is_recoverable());
        assert!(RigError::UnsupportedSampleRate {
            requested: 44100.0,
            expected: 48000.0
        }
        .is_recoverable());
        assert!(!RigError::load("cab.wav", "no samples").is_recoverable());
    }

    #[test]
    fn test_with_source_name() {
        let err = RigError::load("model", "bad weights").with_source_name("amp.nam");
        assert_eq!(err.to_string(), "Failed to load amp.nam: bad weights");

        let err = RigError::invalid_buffer("x").with_source_name("amp.nam");
        assert_eq!(err.error_code(), "INVALID_BUFFER");
    }

    #[test]
    fn test_serde_error_converts() {
        let err: RigError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }
}

//! Error types for the detection pipeline.

use std::time::Duration;

use thiserror::Error;

/// Failure of one detection request.
///
/// A missing support plane is not an error; it is reported through
/// [`DetectionResult::plane_found`](crate::DetectionResult::plane_found).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    #[error("producer stalled: collected {collected} of {expected} frames, waited {waited:?} for the next one")]
    ProducerStalled {
        collected: usize,
        expected: usize,
        waited: Duration,
    },

    #[error("detection cancelled")]
    Cancelled,

    #[error("frame count must be at least 1")]
    InvalidFrameCount,
}

/// Configuration load or validation error.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DetectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stall_message_names_progress() {
        let err = DetectError::ProducerStalled {
            collected: 3,
            expected: 15,
            waited: Duration::from_millis(250),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 of 15"), "{msg}");
        assert!(msg.contains("250ms"), "{msg}");
    }

    #[test]
    fn config_error_wraps_yaml() {
        let yaml_err = serde_yaml::from_str::<u32>("[1, 2").unwrap_err();
        let err: ConfigError = yaml_err.into();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("Parse error"));
    }
}

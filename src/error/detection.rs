// Detection run error types

use crate::error::{ConfigError, ErrorCode, MediaError};
use log::error;
use std::fmt;

/// Log a detection error with structured context
pub fn log_detection_error(err: &DetectionError, context: &str) {
    error!(
        "Detection error in {}: code={}, component=RallyDetectionEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Fatal errors for a single detection run
///
/// Cancellation is not represented here; it surfaces as
/// [`crate::engine::DetectionOutcome::Cancelled`].
///
/// Error code range: 3001-3004
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// Configuration rejected before analysis started
    Config(ConfigError),

    /// Non-recoverable media failure
    Media(MediaError),

    /// Video reports no analysable duration
    EmptyVideo { duration: f64 },

    /// The bounded chunk worker pool could not be created
    WorkerPool { details: String },
}

impl ErrorCode for DetectionError {
    fn code(&self) -> i32 {
        match self {
            DetectionError::Config(_) => 3001,
            DetectionError::Media(_) => 3002,
            DetectionError::EmptyVideo { .. } => 3003,
            DetectionError::WorkerPool { .. } => 3004,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectionError::Config(err) => format!("Invalid configuration: {}", err.message()),
            DetectionError::Media(err) => format!("Media failure: {}", err.message()),
            DetectionError::EmptyVideo { duration } => {
                format!("Video duration {:.3}s is too short to analyse", duration)
            }
            DetectionError::WorkerPool { details } => {
                format!("Failed to start chunk workers: {}", details)
            }
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DetectionError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for DetectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DetectionError::Config(err) => Some(err),
            DetectionError::Media(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for DetectionError {
    fn from(err: ConfigError) -> Self {
        DetectionError::Config(err)
    }
}

impl From<MediaError> for DetectionError {
    fn from(err: MediaError) -> Self {
        DetectionError::Media(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_messages_keep_detail() {
        let err = DetectionError::from(ConfigError::WeightSum {
            group: "fusion".to_string(),
            sum: 1.2,
        });
        assert_eq!(err.code(), 3001);
        assert!(err.message().contains("fusion weights"));

        let err = DetectionError::from(MediaError::DecodeFailed {
            timestamp: 4.2,
            details: "corrupt".to_string(),
        });
        assert!(err.to_string().contains("4.200s"));
    }
}

// Media access error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Log a media error with structured context
pub fn log_media_error(err: &MediaError, context: &str) {
    error!(
        "Media error in {}: code={}, component=MediaProvider, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by media providers and pose estimation
///
/// Audio-track absence is recoverable (the engine degrades to movement-only
/// detection); every other variant is fatal for the run.
///
/// Error code range: 2001-2006
#[derive(Debug, Clone, PartialEq)]
pub enum MediaError {
    /// Source has no audio track
    AudioTrackMissing,

    /// Source has no video track
    VideoTrackMissing,

    /// A frame or sample block could not be decoded
    DecodeFailed { timestamp: f64, details: String },

    /// Source could not be opened or is corrupt
    Unreadable { details: String },

    /// The pose estimator failed for a frame
    PoseEstimationFailed { timestamp: f64, details: String },

    /// Analysis was interrupted through a cancellation token
    Cancelled,
}

impl MediaError {
    /// Whether the engine may continue without the failing track
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MediaError::AudioTrackMissing)
    }
}

impl ErrorCode for MediaError {
    fn code(&self) -> i32 {
        match self {
            MediaError::AudioTrackMissing => 2001,
            MediaError::VideoTrackMissing => 2002,
            MediaError::DecodeFailed { .. } => 2003,
            MediaError::Unreadable { .. } => 2004,
            MediaError::PoseEstimationFailed { .. } => 2005,
            MediaError::Cancelled => 2006,
        }
    }

    fn message(&self) -> String {
        match self {
            MediaError::AudioTrackMissing => "Source has no audio track".to_string(),
            MediaError::VideoTrackMissing => "Source has no video track".to_string(),
            MediaError::DecodeFailed { timestamp, details } => {
                format!("Decode failed at {:.3}s: {}", timestamp, details)
            }
            MediaError::Unreadable { details } => format!("Unreadable source: {}", details),
            MediaError::PoseEstimationFailed { timestamp, details } => {
                format!("Pose estimation failed at {:.3}s: {}", timestamp, details)
            }
            MediaError::Cancelled => "Analysis cancelled".to_string(),
        }
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for MediaError {}

impl From<std::io::Error> for MediaError {
    fn from(err: std::io::Error) -> Self {
        MediaError::Unreadable {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_audio_absence_is_recoverable() {
        assert!(MediaError::AudioTrackMissing.is_recoverable());
        assert!(!MediaError::VideoTrackMissing.is_recoverable());
        assert!(!MediaError::DecodeFailed {
            timestamp: 1.0,
            details: "bad frame".to_string()
        }
        .is_recoverable());
    }

    #[test]
    fn test_decode_message_includes_timestamp() {
        let err = MediaError::DecodeFailed {
            timestamp: 12.5,
            details: "truncated packet".to_string(),
        };
        assert!(err.message().contains("12.500s"));
        assert_eq!(err.code(), 2003);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.wav");
        match MediaError::from(io_err) {
            MediaError::Unreadable { details } => assert!(details.contains("missing.wav")),
            other => panic!("Expected Unreadable variant, got {:?}", other),
        }
    }
}

// Error types for the rally detector
//
// This module defines the error taxonomy for configuration, media access,
// detection runs and ground-truth annotations. Every error carries a stable
// numeric code so operator tooling can react without string matching.

mod annotation;
mod config;
mod detection;
mod media;

pub use annotation::{AnnotationError, AnnotationIssue, AnnotationIssueKind};
pub use config::{log_config_error, ConfigError};
pub use detection::{log_detection_error, DetectionError};
pub use media::{log_media_error, MediaError};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and the CLI.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

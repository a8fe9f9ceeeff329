// Ground-truth annotation error types

use crate::error::ErrorCode;
use serde::Serialize;
use std::fmt;

/// Errors that prevent an annotation file from being read at all
///
/// Content problems (bad intervals, overlaps) are not errors; they are
/// collected as [`AnnotationIssue`] values so the whole file can be fixed
/// in one pass.
///
/// Error code range: 4001-4002
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationError {
    /// File could not be read
    Io { path: String, details: String },

    /// File is not a valid annotation document
    Parse { path: String, details: String },
}

impl ErrorCode for AnnotationError {
    fn code(&self) -> i32 {
        match self {
            AnnotationError::Io { .. } => 4001,
            AnnotationError::Parse { .. } => 4002,
        }
    }

    fn message(&self) -> String {
        match self {
            AnnotationError::Io { path, details } => {
                format!("Failed to read annotation file {}: {}", path, details)
            }
            AnnotationError::Parse { path, details } => {
                format!("Invalid annotation file {}: {}", path, details)
            }
        }
    }
}

impl fmt::Display for AnnotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnnotationError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for AnnotationError {}

/// Category of an annotation consistency problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationIssueKind {
    NegativeStart,
    EmptyInterval,
    ScoreOutOfRange,
    Overlap,
    NonFinite,
}

/// A single consistency problem found in an annotation file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationIssue {
    pub kind: AnnotationIssueKind,
    /// Index of the offending rally in file order
    pub rally_index: usize,
    /// Second rally involved, for overlaps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_index: Option<usize>,
    pub message: String,
}

impl fmt::Display for AnnotationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rally #{}: {}", self.rally_index, self.message)
    }
}

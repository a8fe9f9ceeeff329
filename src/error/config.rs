// Configuration error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Log a configuration error with structured context
///
/// Logs the numeric code, the component and the message so operators can
/// correlate a rejected config file with the parameter that tripped it.
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=ThresholdConfig, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Threshold configuration errors
///
/// Configuration errors are fatal at load time. Values are never clamped;
/// the offending parameter is always named.
///
/// Error code range: 1001-1005
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter is outside its allowed range
    OutOfRange {
        parameter: String,
        value: f64,
        expected: String,
    },

    /// A weight group does not sum to 1.0 (±0.01)
    WeightSum { group: String, sum: f64 },

    /// Two parameters violate an ordering/consistency relation
    InvalidRelation { parameter: String, details: String },

    /// Config file could not be read or written
    Io { path: String, details: String },

    /// Config document is not valid JSON for this schema
    Parse { details: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::OutOfRange { .. } => 1001,
            ConfigError::WeightSum { .. } => 1002,
            ConfigError::InvalidRelation { .. } => 1003,
            ConfigError::Io { .. } => 1004,
            ConfigError::Parse { .. } => 1005,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::OutOfRange {
                parameter,
                value,
                expected,
            } => format!("{} = {} is out of range (expected {})", parameter, value, expected),
            ConfigError::WeightSum { group, sum } => {
                format!("{} weights sum to {:.4}, expected 1.0 ± 0.01", group, sum)
            }
            ConfigError::InvalidRelation { parameter, details } => {
                format!("{}: {}", parameter, details)
            }
            ConfigError::Io { path, details } => {
                format!("Failed to access config file {}: {}", path, details)
            }
            ConfigError::Parse { details } => format!("Invalid config document: {}", details),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{} (code {}): {}",
            self.variant_name(),
            self.code(),
            self.message()
        )
    }
}

impl ConfigError {
    fn variant_name(&self) -> &'static str {
        match self {
            ConfigError::OutOfRange { .. } => "OutOfRange",
            ConfigError::WeightSum { .. } => "WeightSum",
            ConfigError::InvalidRelation { .. } => "InvalidRelation",
            ConfigError::Io { .. } => "Io",
            ConfigError::Parse { .. } => "Parse",
        }
    }

    /// Name of the parameter (or group) responsible, when there is one
    pub fn parameter(&self) -> Option<&str> {
        match self {
            ConfigError::OutOfRange { parameter, .. }
            | ConfigError::InvalidRelation { parameter, .. } => Some(parameter),
            ConfigError::WeightSum { group, .. } => Some(group),
            ConfigError::Io { .. } | ConfigError::Parse { .. } => None,
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse {
            details: err.to_string(),
        }
    }
}

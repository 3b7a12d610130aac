//! Core error types for attention-core.
//!
//! Errors fall into two families: fatal errors that abort a run before any
//! data is processed ([`CoreError`], [`ConfigError`]) and per-record errors
//! that drop a single event and are tallied in the run diagnostics
//! ([`MalformedEventError`]).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for attention-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
///
/// Any of these aborts the run: they invalidate every downstream computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// A domain referenced somewhere in the config is not in the taxonomy
    #[error("Domain '{domain}' referenced by '{key}' is not part of the taxonomy")]
    UnknownDomain { key: String, domain: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// A raw calendar record that could not be normalized.
///
/// The offending record is dropped and counted; the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedEventError {
    #[error("event has no start time")]
    MissingStart,

    #[error("event has no end time")]
    MissingEnd,

    #[error("cannot parse {field} timestamp '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    /// Local wall-clock time falls inside a DST gap.
    #[error("local time '{0}' does not exist in the event timezone")]
    NonexistentLocalTime(String),

    #[error("end ({end}) precedes or equals start ({start})")]
    EndBeforeStart { start: String, end: String },

    #[error("attendee count {0} is negative")]
    NegativeAttendeeCount(i64),

    #[error("invalid recurrence rule: {0}")]
    InvalidRecurrence(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_wraps_into_core_error() {
        let err: CoreError = ConfigError::MissingKey("taxonomy.domains".into()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required configuration key: taxonomy.domains"
        );
    }

    #[test]
    fn malformed_event_messages_name_the_field() {
        let err = MalformedEventError::InvalidTimestamp {
            field: "start",
            value: "yesterday".into(),
        };
        assert_eq!(err.to_string(), "cannot parse start timestamp 'yesterday'");
    }
}

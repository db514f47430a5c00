//! Unified error handling for the congestion engine.
//!
//! Every failure is classified into one of three kinds so that callers (CLI,
//! HTTP shims) can map them onto their own responses:
//! - **Validation** - malformed input shape, always caller-fixable
//! - **Configuration** - well-formed input that is semantically inconsistent
//! - **Computation** - internal invariant violation, fatal

use thiserror::Error;

/// Coarse classification of a [`CongestionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Configuration,
    Computation,
}

/// Unified error type for congestion analysis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CongestionError {
    /// An analysis parameter is out of range
    #[error("Invalid parameter {field}={value}: {reason}")]
    InvalidParameter {
        field: String,
        value: String,
        reason: String,
    },

    /// A segment definition is malformed
    #[error("Invalid segment '{segment}': {field}={value} ({reason})")]
    InvalidSegment {
        segment: String,
        field: String,
        value: String,
        reason: String,
    },

    /// A required CSV column is absent
    #[error("{file} is missing required column '{column}'")]
    MissingColumn { file: String, column: String },

    /// A CSV record could not be read or decoded
    #[error("CSV error: {message}")]
    Csv { message: String },

    /// An event has no start offset
    #[error("No start time for event '{event}' ({context})")]
    MissingStartTime { event: String, context: String },

    /// An event referenced by a segment has no runners loaded
    #[error("No runners for event '{event}' (segment {segment})")]
    MissingEvent { event: String, segment: String },

    /// A segment selector matched nothing in the catalogue
    #[error("Selector '{selector}' matches no segment{}", format_available(.available))]
    UnmatchedSelector {
        selector: String,
        available: Vec<String>,
    },

    /// Internal invariant violation
    #[error("Computation error in segment {segment}: {message}")]
    Computation { segment: String, message: String },
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "; event not present in catalogue".to_string()
    } else {
        format!("; valid segments: {}", available.join(", "))
    }
}

impl CongestionError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CongestionError::InvalidParameter { .. }
            | CongestionError::InvalidSegment { .. }
            | CongestionError::MissingColumn { .. }
            | CongestionError::Csv { .. } => ErrorKind::Validation,
            CongestionError::MissingStartTime { .. }
            | CongestionError::MissingEvent { .. }
            | CongestionError::UnmatchedSelector { .. } => ErrorKind::Configuration,
            CongestionError::Computation { .. } => ErrorKind::Computation,
        }
    }

    pub(crate) fn invalid_parameter(field: &str, value: impl ToString, reason: &str) -> Self {
        CongestionError::InvalidParameter {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<csv::Error> for CongestionError {
    fn from(err: csv::Error) -> Self {
        CongestionError::Csv {
            message: err.to_string(),
        }
    }
}

/// Result type alias for congestion operations.
pub type Result<T> = std::result::Result<T, CongestionError>;

/// Extension trait for converting lookups into configuration errors.
pub trait OptionExt<T> {
    /// Convert a missing start offset into [`CongestionError::MissingStartTime`].
    fn ok_or_missing_start(self, event: &str, context: &str) -> Result<T>;

    /// Convert a missing roster into [`CongestionError::MissingEvent`].
    fn ok_or_missing_event(self, event: &str, segment: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing_start(self, event: &str, context: &str) -> Result<T> {
        self.ok_or_else(|| CongestionError::MissingStartTime {
            event: event.to_string(),
            context: context.to_string(),
        })
    }

    fn ok_or_missing_event(self, event: &str, segment: &str) -> Result<T> {
        self.ok_or_else(|| CongestionError::MissingEvent {
            event: event.to_string(),
            segment: segment.to_string(),
        })
    }
}

//! Shared error type across metricweave crates.

use thiserror::Error;

use crate::identity::{MetricIdentity, MetricKind};

/// Stable classification of an error, used by callers that want to branch
/// without matching on payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Programming/configuration error. Never retried.
    Configuration,
    /// The registry or a metric refused an update. Non-fatal.
    Recording,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Configuration => "CONFIGURATION",
            ErrorClass::Recording => "RECORDING",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by the registry and the interception engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetricsError {
    #[error("kind conflict for {identity}: registered as {existing}, requested as {requested}")]
    KindConflict {
        identity: MetricIdentity,
        existing: MetricKind,
        requested: MetricKind,
    },
    #[error("recording failed: {0}")]
    RecordingFailure(String),
    #[error("registry capacity of {limit} metrics exceeded")]
    CapacityExceeded { limit: usize },
    #[error("invalid tags: {0}")]
    InvalidTags(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
}

impl MetricsError {
    pub fn class(&self) -> ErrorClass {
        match self {
            MetricsError::KindConflict { .. }
            | MetricsError::InvalidTags(_)
            | MetricsError::InvalidConfig(_)
            | MetricsError::UnsupportedVersion => ErrorClass::Configuration,
            MetricsError::RecordingFailure(_) | MetricsError::CapacityExceeded { .. } => {
                ErrorClass::Recording
            }
        }
    }

    pub fn is_kind_conflict(&self) -> bool {
        matches!(self, MetricsError::KindConflict { .. })
    }
}

//! Error types for kstatsd.
//!
//! Structured error handling with category classification so callers can
//! apply the containment policy uniformly: per-item failures (a counter
//! file missing, content that fails format parsing, a sink rejection) are
//! logged and skipped at the item boundary, while only timer setup failure
//! and a tripped stream circuit breaker are fatal to their subsystem.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for kstatsd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A counter path or device file cannot be read or written.
    Source,
    /// Content present but fails expected-format parsing.
    Parse,
    /// The telemetry sink rejected or could not be reached.
    Sink,
    /// The kernel event socket failed to deliver a datagram.
    Stream,
    /// The base timer could not be created or armed.
    Timer,
    /// Configuration file errors.
    Config,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Source => write!(f, "source"),
            ErrorCategory::Parse => write!(f, "parse"),
            ErrorCategory::Sink => write!(f, "sink"),
            ErrorCategory::Stream => write!(f, "stream"),
            ErrorCategory::Timer => write!(f, "timer"),
            ErrorCategory::Config => write!(f, "config"),
        }
    }
}

/// Unified error type for kstatsd.
#[derive(Error, Debug)]
pub enum Error {
    /// A sysfs attribute or device file could not be read.
    #[error("unable to read {path}: {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A write-back (e.g. clear-on-read reset) could not be performed.
    #[error("unable to write {path}: {source}")]
    SourceWriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Content was present but did not match the expected format.
    #[error("malformed data in {path}: {reason}")]
    MalformedData { path: String, reason: String },

    /// The telemetry sink rejected an event or could not be reached.
    #[error("telemetry sink rejected {event}: {reason}")]
    SinkRejected { event: String, reason: String },

    /// The kernel event socket read failed or returned malformed framing.
    #[error("event stream receive failed: {0}")]
    StreamReceive(String),

    /// The event loop exceeded its consecutive-failure threshold.
    #[error("event stream circuit breaker tripped after {failures} consecutive failures")]
    StreamExhausted { failures: u32 },

    /// The base timer could not be created or armed.
    #[error("unable to set up base timer: {0}")]
    TimerSetup(#[source] std::io::Error),

    /// Configuration could not be loaded or validated.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Category for grouping and metric labelling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::SourceUnavailable { .. } | Error::SourceWriteFailed { .. } => {
                ErrorCategory::Source
            }
            Error::MalformedData { .. } => ErrorCategory::Parse,
            Error::SinkRejected { .. } => ErrorCategory::Sink,
            Error::StreamReceive(_) | Error::StreamExhausted { .. } => ErrorCategory::Stream,
            Error::TimerSetup(_) => ErrorCategory::Timer,
            Error::Config(_) => ErrorCategory::Config,
        }
    }

    /// Whether this error terminates its subsystem.
    ///
    /// Everything else is contained at the item boundary by the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::TimerSetup(_) | Error::StreamExhausted { .. } | Error::Config(_)
        )
    }

    /// Convenience constructor for read failures.
    pub fn source_unavailable(path: impl Into<String>, source: std::io::Error) -> Self {
        Error::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Convenience constructor for parse failures.
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedData {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

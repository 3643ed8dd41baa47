//! Error types for quakescope.
//!
//! Uses `thiserror` for library-style error definitions. Feed failures are
//! plain values so a settled fetch can be inspected without downcasting.

use thiserror::Error;

/// Errors that can occur in quakescope operations.
#[derive(Error, Debug)]
pub enum QuakeError {
    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// JSON decoding failed at a feature's schema boundary
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A fetch settled with a failure
    #[error(transparent)]
    Feed(#[from] FeedFailure),

    /// Payload had an unexpected shape
    #[error("Malformed feed content: {0}")]
    Malformed(String),

    /// User-supplied input rejected before any fetch
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A feature was asked to work before its dependency settled ready
    #[error("Dependency not ready: {id}")]
    DependencyUnmet { id: String },

    /// A second feature with an id already registered for this selection
    #[error("Duplicate feature id: {id}")]
    DuplicateFeature { id: String },

    /// Lookup for an id that was never created or has been cleared
    #[error("No such feature: {id}")]
    FeatureNotFound { id: String },

    /// Operation on a feature after `destroy()`
    #[error("Feature {id} has been destroyed")]
    Destroyed { id: String },

    /// Completion channel closed while features were still outstanding
    #[error("Selection interrupted before all features settled")]
    Interrupted,
}

/// A settled fetch failure.
///
/// Carried as a value through the completion channel; `message` is what the
/// status bar shows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FeedFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Classification of a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Request did not complete within the allotted time (or the connection
    /// failed outright)
    Timeout,
    /// Server responded with a non-success status
    Http(u16),
    /// Response body was not valid JSON
    Parse,
}

impl FeedFailure {
    /// Timeout-class failure referencing the unreachable host.
    #[must_use]
    pub fn timeout(host: &str) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: format!("{host} could not be reached"),
        }
    }

    /// HTTP-class failure with status code and text.
    #[must_use]
    pub fn http(status: u16, text: &str) -> Self {
        Self {
            kind: FailureKind::Http(status),
            message: format!("HTTP {status}: {text}"),
        }
    }

    /// Content/format failure.
    #[must_use]
    pub fn parse(detail: &str) -> Self {
        Self {
            kind: FailureKind::Parse,
            message: format!("Response could not be parsed: {detail}"),
        }
    }
}

//! Error taxonomy for guarded calls and breaker configuration.

use std::time::Duration;
use thiserror::Error;

/// Outcome of a guarded call that did not produce a value.
///
/// The variants let a caller tell "dependency unavailable, retry later"
/// (`Open`) apart from "this one call failed" (`Failure`).
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// The circuit is open and no usable fallback is configured.
    #[error("circuit breaker '{name}' is open, retry in {retry_after:?}")]
    Open { name: String, retry_after: Duration },

    /// The operation failed and the failure was recorded.
    #[error("call guarded by '{name}' failed: {source}")]
    Failure {
        name: String,
        #[source]
        source: E,
    },

    /// The operation failed with an error the classifier does not count.
    #[error(transparent)]
    Unclassified(E),

    /// The circuit was open and the fallback itself failed.
    #[error("fallback for '{name}' failed: {source}")]
    Fallback {
        name: String,
        #[source]
        source: E,
    },
}

impl<E> BreakerError<E> {
    /// Whether the call was rejected without running the operation.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// Backoff hint for rejected calls.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BreakerError::Open { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// The underlying operation or fallback error, if there is one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Failure { source, .. }
            | BreakerError::Fallback { source, .. }
            | BreakerError::Unclassified(source) => Some(source),
        }
    }

    /// Borrow the underlying error, if there is one.
    pub fn inner(&self) -> Option<&E> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Failure { source, .. }
            | BreakerError::Fallback { source, .. }
            | BreakerError::Unclassified(source) => Some(source),
        }
    }
}

/// Errors that can occur when loading or validating breaker configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read breaker manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

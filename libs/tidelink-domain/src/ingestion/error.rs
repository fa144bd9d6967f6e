//! Domain errors for ingestion operations
//!
//! Every variant here is invocation-fatal. Per-record problems are never
//! errors: they are reported as rejections or write failures inside the
//! `InvocationResult`.

use thiserror::Error;

use crate::storage::{FetchError, StoreError};

/// Errors that abort an invocation
///
/// These errors represent business-level failures and are independent of
/// infrastructure implementation details (e.g., no AWS SDK error types here).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestionError {
    /// The raw object does not exist
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// The raw object exists but cannot be read
    #[error("Access denied to object: {0}")]
    AccessDenied(String),

    /// Fetching the raw object failed for another reason
    #[error("Failed to fetch object: {0}")]
    FetchFailure(String),

    /// The raw object is larger than the configured limit
    #[error("Object size ({size} bytes) exceeds maximum allowed ({max} bytes)")]
    ObjectTooLarge { size: usize, max: usize },

    /// The raw object does not decode as an array of records
    #[error("Malformed batch: {reason}")]
    MalformedBatch { reason: String },

    /// The store refused a whole chunk for a non-transient reason
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl IngestionError {
    /// Create a malformed batch error with a reason
    pub fn malformed_batch(reason: impl Into<String>) -> Self {
        Self::MalformedBatch {
            reason: reason.into(),
        }
    }

    /// Create an object too large error
    pub fn object_too_large(size: usize, max: usize) -> Self {
        Self::ObjectTooLarge { size, max }
    }

    /// Create a config error with a message
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the input object itself is the problem (unreachable or undecodable)
    ///
    /// Redelivering the same object will not help for these, unlike
    /// `StoreUnavailable`.
    pub fn is_fatal_input(&self) -> bool {
        matches!(
            self,
            Self::ObjectNotFound(_)
                | Self::AccessDenied(_)
                | Self::FetchFailure(_)
                | Self::ObjectTooLarge { .. }
                | Self::MalformedBatch { .. }
        )
    }
}

impl From<FetchError> for IngestionError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(object) => Self::ObjectNotFound(object),
            FetchError::AccessDenied(object) => Self::AccessDenied(object),
            FetchError::Unavailable(msg) => Self::FetchFailure(msg),
        }
    }
}

impl From<StoreError> for IngestionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(msg) | StoreError::Permanent(msg) | StoreError::InvalidRecord(msg) => {
                Self::StoreUnavailable(msg)
            }
        }
    }
}

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestionError>;

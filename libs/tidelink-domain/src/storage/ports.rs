//! Ports (trait definitions) for external dependencies
//!
//! This module defines the contracts (ports) that external adapters must implement.
//! Following hexagonal architecture, the domain defines what it needs, and the
//! infrastructure provides implementations.
//!
//! ## Static Dispatch
//!
//! We use native Rust async traits with `impl Future` return types instead of
//! `async_trait` to ensure zero-cost abstractions and static dispatch.

use std::future::Future;

use bytes::Bytes;
use thiserror::Error;

use crate::record::ValidatedRecord;

/// Errors a fetch collaborator may report
///
/// All of them are invocation-fatal: without the bytes there is nothing to
/// process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The object does not exist
    #[error("object not found: {0}")]
    NotFound(String),

    /// The caller is not allowed to read the object
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Any other failure (network, body read, service error)
    #[error("fetch failed: {0}")]
    Unavailable(String),
}

/// Chunk-level errors a store collaborator may report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Capacity exceeded, throttling, or another condition worth retrying
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Missing table or access denied: retrying will not help
    #[error("permanent store failure: {0}")]
    Permanent(String),

    /// The request was refused because of the content of at least one record
    ///
    /// The store cannot tell which record; the writer narrows it down by
    /// resending smaller batches.
    #[error("store refused request content: {0}")]
    InvalidRecord(String),
}

/// Per-record result of one upsert request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The record is durably stored
    Written,
    /// The store did not process the record this time; it may be resent
    Throttled,
    /// The store refused this record for a non-transient reason
    Rejected(String),
}

/// Port for reading raw batch objects
///
/// This trait abstracts away the object store (S3, filesystem, etc.).
pub trait ObjectFetcher: Send + Sync {
    /// Fetch the full contents of one object
    ///
    /// # Arguments
    ///
    /// * `store_location_id` - Bucket-like container identifier
    /// * `object_key` - Key of the object inside the container
    ///
    /// # Errors
    ///
    /// Returns `FetchError::NotFound`, `FetchError::AccessDenied`, or
    /// `FetchError::Unavailable` for anything else
    fn fetch(
        &self,
        store_location_id: &str,
        object_key: &str,
    ) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// Port for durable record upserts
///
/// Implementations must treat `(partition_key, sort_key)` as the record
/// identity and overwrite on conflict. Concurrency control for concurrent
/// writes to the same key is the store's own business.
pub trait RecordStore: Send + Sync {
    /// Largest number of records the store accepts in a single request
    fn max_batch_size(&self) -> usize {
        usize::MAX
    }

    /// Upsert a batch of records into `table`
    ///
    /// On success, returns one outcome per input record, in input order.
    /// The batch never contains two records with the same key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the request as a whole failed and no
    /// per-record outcome is known.
    fn upsert_batch(
        &self,
        table: &str,
        records: &[ValidatedRecord],
    ) -> impl Future<Output = Result<Vec<WriteOutcome>, StoreError>> + Send;
}

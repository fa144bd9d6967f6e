//! Storage module
//!
//! Ports for the two external collaborators (object fetch, record upsert), the
//! store writer that chunks and retries upserts, and in-memory adapters.

pub mod memory;
mod ports;
mod retry;
mod writer;

pub use ports::{FetchError, ObjectFetcher, RecordStore, StoreError, WriteOutcome};
pub use retry::RetryPolicy;
pub use writer::{StoreWriter, WriteFailure, WriteFailureCause, WriteReport};

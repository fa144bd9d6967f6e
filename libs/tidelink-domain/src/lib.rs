//! # TideLink Domain Layer
//!
//! This crate contains the pure business logic of the TideLink record ingestion
//! function. A raw batch file lands in an object store, the batch is parsed into
//! candidate records, each record is validated, and the accepted records are
//! upserted into a table store. Bad records are isolated and reported; they
//! never abort the rest of the batch.
//!
//! It follows hexagonal architecture principles:
//!
//! - **Record model**: candidate and validated records, rejection reasons ([`record`])
//! - **Batch parser**: raw bytes to ordered candidates ([`batch`])
//! - **Orchestrator**: the per-invocation state machine ([`ingestion`])
//! - **Ports and writer**: fetch/store traits, chunked retrying writer ([`storage`])
//!
//! ## Architecture
//!
//! This layer has NO dependencies on infrastructure concerns (AWS, S3, DynamoDB,
//! Lambda). All external dependencies are expressed as traits (ports) that are
//! implemented by adapter crates.
//!
//! ## Example
//!
//! ```rust
//! use tidelink_domain::ingestion::{IngestionConfig, IngestionService, RawObjectReference};
//! use tidelink_domain::storage::memory::{InMemoryObjectStore, InMemoryRecordStore};
//!
//! # async fn example() -> Result<(), tidelink_domain::IngestionError> {
//! let objects = InMemoryObjectStore::new();
//! objects.insert(
//!     "raw-bucket",
//!     "batch.json",
//!     r#"[{"device_id":"d1","timestamp":"2026-02-01T10:00:00Z","value":42}]"#,
//! );
//!
//! let service = IngestionService::new(objects, InMemoryRecordStore::new(), IngestionConfig::default())?;
//! let result = service
//!     .ingest(&RawObjectReference::new("raw-bucket", "batch.json", chrono::Utc::now()))
//!     .await?;
//! assert_eq!(result.accepted, 1);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod ingestion;
pub mod record;
pub mod storage;

// Re-export commonly used types
pub use ingestion::{IngestionConfig, IngestionError, IngestionService, InvocationResult, RawObjectReference};
pub use record::{CandidateRecord, RecordKey, RecordSchema, Rejection, RejectionReason, ValidatedRecord};
pub use storage::{ObjectFetcher, RecordStore};

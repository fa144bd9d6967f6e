//! Ingestion service - Invocation orchestration
//!
//! This module contains the orchestrator that drives one invocation end to
//! end: fetch the raw object, parse it, validate every record, write the
//! accepted ones, and assemble the result.
//!
//! Only conditions that make the whole batch uninterpretable (object
//! unreachable, batch undecodable) or the store unusable end the invocation
//! with an error. A bad record, or a record the store would not take, is
//! reported in the result and the rest of the batch carries on.

use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use super::phase::{Phase, PhaseTracker};
use super::{IngestionConfig, IngestionError, InvocationId, InvocationResult, ObjectSummary, RawObjectReference};
use crate::batch::{parse_batch, BatchElement, ParsedBatch};
use crate::record::{Rejection, ValidatedRecord};
use crate::storage::{ObjectFetcher, RecordStore, StoreWriter};

/// Service for ingesting raw batch objects into the table store
///
/// ## Static Dispatch
///
/// The service is generic over any `ObjectFetcher` and `RecordStore`
/// implementation. The compiler will generate specialized versions for each
/// concrete pair, resulting in zero-cost abstractions.
///
/// The service holds no per-invocation state, so one instance can serve any
/// number of concurrent invocations.
pub struct IngestionService<F, S> {
    fetcher: F,
    writer: StoreWriter<S>,
    config: IngestionConfig,
}

impl<F, S> IngestionService<F, S>
where
    F: ObjectFetcher,
    S: RecordStore,
{
    /// Create a new IngestionService with the given collaborators and configuration
    ///
    /// # Errors
    ///
    /// Returns `IngestionError::ConfigError` if the configuration is invalid.
    pub fn new(fetcher: F, store: S, config: IngestionConfig) -> Result<Self, IngestionError> {
        config.validate()?;

        let writer = StoreWriter::new(
            store,
            config.table_name.clone(),
            config.max_chunk_size,
            config.max_concurrent_chunks,
            config.retry_policy(),
        );

        info!(
            table = %config.table_name,
            chunk_size = writer.chunk_size(),
            max_attempts = config.max_attempts,
            "Ingestion service ready"
        );

        Ok(Self {
            fetcher,
            writer,
            config,
        })
    }

    /// Process the object referenced by one trigger event
    ///
    /// This is the main entry point. It:
    /// 1. Fetches the raw bytes through the fetch port
    /// 2. Parses them as a JSON array of records
    /// 3. Validates every record independently
    /// 4. Upserts the accepted records through the store writer
    /// 5. Returns counts and per-record reasons
    ///
    /// # Errors
    ///
    /// - `IngestionError::ObjectNotFound` / `AccessDenied` / `FetchFailure` if
    ///   the object cannot be read
    /// - `IngestionError::ObjectTooLarge` if it exceeds `max_object_bytes`
    /// - `IngestionError::MalformedBatch` if it is not a JSON array
    /// - `IngestionError::StoreUnavailable` if the store refuses a whole chunk
    ///   for a non-transient reason
    ///
    /// No store mutation happens for any error raised before the write phase.
    pub async fn ingest(&self, reference: &RawObjectReference) -> Result<InvocationResult, IngestionError> {
        let invocation_id = InvocationId::new();
        let span = info_span!(
            "ingest",
            invocation_id = %invocation_id,
            bucket = %reference.store_location_id(),
            key = %reference.object_key()
        );

        self.run(invocation_id, reference).instrument(span).await
    }

    async fn run(
        &self,
        invocation_id: InvocationId,
        reference: &RawObjectReference,
    ) -> Result<InvocationResult, IngestionError> {
        let started = Instant::now();
        let mut phase = PhaseTracker::new();
        let max_bytes = self.config.max_object_bytes;

        if let Some(size) = reference.size() {
            let size = usize::try_from(size).unwrap_or(usize::MAX);
            if size > max_bytes {
                return Err(phase.fail(IngestionError::object_too_large(size, max_bytes)));
            }
        }

        let bytes = self
            .fetcher
            .fetch(reference.store_location_id(), reference.object_key())
            .await
            .map_err(|err| phase.fail(err.into()))?;

        if bytes.len() > max_bytes {
            return Err(phase.fail(IngestionError::object_too_large(bytes.len(), max_bytes)));
        }
        debug!(size = bytes.len(), "Fetched raw object");

        phase.advance(Phase::Parsing);
        let batch = parse_batch(&bytes).map_err(|err| phase.fail(err))?;
        drop(bytes);

        phase.advance(Phase::Validating);
        let total = batch.len();
        let (accepted, rejections) = self.validate_batch(batch);

        phase.advance(Phase::Writing);
        let accepted_count = accepted.len();
        let report = self
            .writer
            .write_all(accepted)
            .await
            .map_err(|err| phase.fail(err.into()))?;

        phase.advance(Phase::Completed);

        let result = InvocationResult {
            invocation_id,
            object: ObjectSummary::from(reference),
            accepted: accepted_count,
            rejected: rejections.len(),
            failed_writes: report.failures.len(),
            superseded: report.superseded,
            rejections,
            failures: report.failures,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if result.is_clean() {
            info!(
                phase = %phase.current(),
                records = total,
                accepted = result.accepted,
                duration_ms = result.duration_ms,
                "Batch ingested"
            );
        } else {
            warn!(
                phase = %phase.current(),
                records = total,
                accepted = result.accepted,
                rejected = result.rejected,
                failed_writes = result.failed_writes,
                duration_ms = result.duration_ms,
                "Batch ingested with per-record failures"
            );
        }

        Ok(result)
    }

    /// Split a parsed batch into accepted records and rejections
    ///
    /// Each element is judged on its own, so the partition does not depend on
    /// the order of the batch.
    fn validate_batch(&self, batch: ParsedBatch) -> (Vec<ValidatedRecord>, Vec<Rejection>) {
        let mut accepted = Vec::with_capacity(batch.len());
        let mut rejections = Vec::new();

        for element in batch {
            match element {
                BatchElement::Candidate(candidate) => match self.config.schema.validate(candidate) {
                    Ok(record) => accepted.push(record),
                    Err(rejection) => {
                        debug!(
                            index = rejection.index,
                            reason = %rejection.reason,
                            field = rejection.field.as_deref().unwrap_or(""),
                            "Record rejected"
                        );
                        rejections.push(rejection);
                    }
                },
                BatchElement::Uninterpretable { index, kind } => {
                    debug!(index, kind, "Batch element is not an object");
                    rejections.push(Rejection::malformed(index));
                }
            }
        }

        (accepted, rejections)
    }

    /// Get the service configuration
    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Get the record store the service writes to
    pub fn store(&self) -> &S {
        self.writer.store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordKey, RejectionReason};
    use crate::storage::memory::{InMemoryObjectStore, InMemoryRecordStore};
    use crate::storage::StoreError;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    const BUCKET: &str = "raw-batches";

    fn reference(key: &str) -> RawObjectReference {
        RawObjectReference::new(BUCKET, key, Utc::now())
    }

    fn service(
        objects: &InMemoryObjectStore,
        store: &InMemoryRecordStore,
    ) -> IngestionService<InMemoryObjectStore, InMemoryRecordStore> {
        let config = IngestionConfig {
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(4),
            ..IngestionConfig::for_table("Readings")
        };
        IngestionService::new(objects.clone(), store.clone(), config).unwrap()
    }

    #[tokio::test]
    async fn test_single_record_end_to_end() {
        let objects = InMemoryObjectStore::new();
        let store = InMemoryRecordStore::new();
        objects.insert(
            BUCKET,
            "one.json",
            r#"[{"device_id":"d1","timestamp":"2026-02-01T10:00:00Z","value":42}]"#,
        );

        let result = service(&objects, &store).ingest(&reference("one.json")).await.unwrap();

        assert_eq!(result.accepted, 1);
        assert_eq!(result.rejected, 0);
        assert_eq!(result.failed_writes, 0);
        assert!(result.rejections.is_empty());

        let stored = store
            .get("Readings", &RecordKey::new("d1", "2026-02-01T10:00:00Z"))
            .unwrap();
        assert_eq!(stored["value"], json!(42));
        assert_eq!(store.len("Readings"), 1);
    }

    #[tokio::test]
    async fn test_empty_array_completes() {
        let objects = InMemoryObjectStore::new();
        let store = InMemoryRecordStore::new();
        objects.insert(BUCKET, "empty.json", "[]");

        let result = service(&objects, &store).ingest(&reference("empty.json")).await.unwrap();

        assert_eq!((result.accepted, result.rejected, result.failed_writes), (0, 0, 0));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_array_is_fatal_and_writes_nothing() {
        let objects = InMemoryObjectStore::new();
        let store = InMemoryRecordStore::new();
        objects.insert(BUCKET, "object.json", r#"{"device_id":"d1"}"#);

        let err = service(&objects, &store)
            .ingest(&reference("object.json"))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestionError::MalformedBatch { .. }));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_object_is_fatal() {
        let objects = InMemoryObjectStore::new();
        let store = InMemoryRecordStore::new();

        let err = service(&objects, &store)
            .ingest(&reference("missing.json"))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestionError::ObjectNotFound(_)));
    }

    #[tokio::test]
    async fn test_announced_size_over_limit_skips_fetch() {
        let objects = InMemoryObjectStore::new();
        let store = InMemoryRecordStore::new();
        objects.insert(BUCKET, "big.json", "[]");

        let config = IngestionConfig {
            max_object_bytes: 10,
            ..IngestionConfig::for_table("Readings")
        };
        let service = IngestionService::new(objects.clone(), store, config).unwrap();

        let err = service
            .ingest(&reference("big.json").with_size(11))
            .await
            .unwrap_err();

        assert_eq!(err, IngestionError::object_too_large(11, 10));
        assert_eq!(objects.fetches(), 0);
    }

    #[tokio::test]
    async fn test_fetched_size_over_limit_is_fatal() {
        let objects = InMemoryObjectStore::new();
        let store = InMemoryRecordStore::new();
        objects.insert(BUCKET, "big.json", "[                ]");

        let config = IngestionConfig {
            max_object_bytes: 10,
            ..IngestionConfig::for_table("Readings")
        };
        let service = IngestionService::new(objects, store, config).unwrap();

        let err = service.ingest(&reference("big.json")).await.unwrap_err();
        assert!(matches!(err, IngestionError::ObjectTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_mixed_batch_reports_each_rejection() {
        let objects = InMemoryObjectStore::new();
        let store = InMemoryRecordStore::new();
        let batch = json!([
            {"device_id": "d1", "timestamp": "2026-02-01T10:00:00Z", "value": 1},
            {"device_id": "", "timestamp": "2026-02-01T10:00:00Z", "value": 2},
            7,
            {"device_id": "d3", "timestamp": "not a time", "value": 3},
            {"device_id": "d4", "timestamp": "2026-02-01T10:00:00Z", "value": 4},
        ]);
        objects.insert(BUCKET, "mixed.json", batch.to_string());

        let result = service(&objects, &store).ingest(&reference("mixed.json")).await.unwrap();

        assert_eq!(result.accepted, 2);
        assert_eq!(result.rejected, 3);
        let reasons: Vec<_> = result.rejections.iter().map(|r| (r.index, r.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (1, RejectionReason::EmptyKey),
                (2, RejectionReason::MalformedBatch),
                (3, RejectionReason::WrongType),
            ]
        );
        assert_eq!(store.len("Readings"), 2);
    }

    #[tokio::test]
    async fn test_permanent_store_failure_is_fatal() {
        let objects = InMemoryObjectStore::new();
        let store = InMemoryRecordStore::new();
        store.script_failures([StoreError::Permanent("table not found".to_string())]);
        objects.insert(
            BUCKET,
            "one.json",
            r#"[{"device_id":"d1","timestamp":"2026-02-01T10:00:00Z","value":42}]"#,
        );

        let err = service(&objects, &store).ingest(&reference("one.json")).await.unwrap_err();

        assert_eq!(err, IngestionError::StoreUnavailable("table not found".to_string()));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = IngestionConfig {
            max_attempts: 0,
            ..IngestionConfig::default()
        };

        let result = IngestionService::new(InMemoryObjectStore::new(), InMemoryRecordStore::new(), config);
        assert!(matches!(result, Err(IngestionError::ConfigError(_))));
    }
}

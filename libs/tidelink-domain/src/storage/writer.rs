//! Store writer - chunked, retrying upserts
//!
//! The writer splits accepted records into chunks no larger than the store
//! allows, sends chunks concurrently, and retries the records a chunk did not
//! get through with capped exponential backoff. Records that still fail are
//! reported one by one; they never abort the other chunks.

use std::collections::HashSet;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{RecordStore, RetryPolicy, StoreError, WriteOutcome};
use crate::record::ValidatedRecord;

/// Why a record could not be persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WriteFailureCause {
    /// Still throttled after the last attempt
    Throttled,
    /// Refused by the store for a non-transient reason
    RejectedByStore,
}

/// A record that was accepted but not persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFailure {
    /// Position of the record in the input array
    pub index: usize,
    pub partition_key: String,
    pub sort_key: String,
    pub cause: WriteFailureCause,
    pub message: String,
}

impl WriteFailure {
    fn new(record: &ValidatedRecord, cause: WriteFailureCause, message: impl Into<String>) -> Self {
        Self {
            index: record.source_index(),
            partition_key: record.partition_key().to_string(),
            sort_key: record.sort_key().to_string(),
            cause,
            message: message.into(),
        }
    }
}

/// Aggregated outcome of writing one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Records durably written
    pub written: usize,
    /// Accepted records replaced by a later record with the same key
    pub superseded: usize,
    /// Chunks dispatched
    pub chunks: usize,
    /// Store requests issued, retries included
    pub requests: usize,
    /// Records that could not be persisted, ordered by source index
    pub failures: Vec<WriteFailure>,
}

#[derive(Debug, Default)]
struct ChunkReport {
    written: usize,
    requests: usize,
    failures: Vec<WriteFailure>,
}

enum GroupOutcome {
    /// Every record was written or reported as failed
    Done,
    /// The store refused the request content; `records` were not written
    Refused {
        reason: String,
        records: Vec<ValidatedRecord>,
    },
}

/// Writes validated records through a [`RecordStore`]
pub struct StoreWriter<S> {
    store: S,
    table: String,
    chunk_size: usize,
    concurrency: usize,
    retry: RetryPolicy,
}

impl<S> StoreWriter<S>
where
    S: RecordStore,
{
    /// Create a writer for `table`
    ///
    /// The effective chunk size is the smaller of `max_chunk_size` and the
    /// store's own batch limit.
    pub fn new(
        store: S,
        table: impl Into<String>,
        max_chunk_size: usize,
        concurrency: usize,
        retry: RetryPolicy,
    ) -> Self {
        let chunk_size = max_chunk_size.min(store.max_batch_size()).max(1);
        Self {
            store,
            table: table.into(),
            chunk_size,
            concurrency: concurrency.max(1),
            retry,
        }
    }

    /// Get the chunk size actually used
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Get the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Write all records, chunked and retried
    ///
    /// Records sharing a key are collapsed first, keeping the last one, so
    /// that no two chunks (and no single chunk) contain the same key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Permanent` if the store fails a request for a
    /// reason unrelated to its records, such as a missing table. Chunks
    /// already written stay written.
    pub async fn write_all(&self, records: Vec<ValidatedRecord>) -> Result<WriteReport, StoreError> {
        let accepted = records.len();
        let records = collapse_duplicate_keys(records);
        let superseded = accepted - records.len();
        if superseded > 0 {
            warn!(superseded, "Batch contains duplicate keys, keeping last occurrence");
        }

        let chunks = into_chunks(records, self.chunk_size);
        let chunk_count = chunks.len();
        debug!(
            records = accepted - superseded,
            chunks = chunk_count,
            chunk_size = self.chunk_size,
            table = %self.table,
            "Dispatching chunks"
        );

        let reports: Vec<ChunkReport> = stream::iter(
            chunks
                .into_iter()
                .enumerate()
                .map(|(chunk_index, chunk)| self.write_chunk(chunk_index, chunk)),
        )
        .buffered(self.concurrency)
        .try_collect()
        .await?;

        let mut report = WriteReport {
            superseded,
            chunks: chunk_count,
            ..WriteReport::default()
        };
        for chunk in reports {
            report.written += chunk.written;
            report.requests += chunk.requests;
            report.failures.extend(chunk.failures);
        }
        report.failures.sort_by_key(|failure| failure.index);

        info!(
            written = report.written,
            failed = report.failures.len(),
            chunks = report.chunks,
            requests = report.requests,
            "Batch write finished"
        );

        Ok(report)
    }

    /// Write one chunk
    ///
    /// A group the store refuses as a whole is split in halves until the
    /// refused record stands alone; that record becomes a failed write.
    async fn write_chunk(
        &self,
        chunk_index: usize,
        chunk: Vec<ValidatedRecord>,
    ) -> Result<ChunkReport, StoreError> {
        let mut report = ChunkReport::default();
        let mut groups = vec![chunk];

        while let Some(group) = groups.pop() {
            match self.write_group(chunk_index, group, &mut report).await? {
                GroupOutcome::Done => {}
                GroupOutcome::Refused { reason, mut records } => {
                    if records.len() == 1 {
                        let record = &records[0];
                        warn!(
                            chunk = chunk_index,
                            key = %record.key(),
                            reason = %reason,
                            "Store refused record"
                        );
                        report.failures.push(WriteFailure::new(
                            record,
                            WriteFailureCause::RejectedByStore,
                            reason,
                        ));
                    } else {
                        let second = records.split_off(records.len() / 2);
                        debug!(
                            chunk = chunk_index,
                            left = records.len(),
                            right = second.len(),
                            reason = %reason,
                            "Store refused group, splitting"
                        );
                        groups.push(second);
                        groups.push(records);
                    }
                }
            }
        }

        Ok(report)
    }

    /// Write one group, resending only the records still pending
    async fn write_group(
        &self,
        chunk_index: usize,
        group: Vec<ValidatedRecord>,
        report: &mut ChunkReport,
    ) -> Result<GroupOutcome, StoreError> {
        let mut pending = group;
        let mut delays = self.retry.delays();
        let mut attempt: u32 = 0;
        let mut last_cause = String::from("throttled by store");

        loop {
            attempt += 1;
            report.requests += 1;

            match self.store.upsert_batch(&self.table, &pending).await {
                Ok(outcomes) => {
                    if outcomes.len() != pending.len() {
                        warn!(
                            chunk = chunk_index,
                            expected = pending.len(),
                            received = outcomes.len(),
                            "Store returned a mismatched number of outcomes"
                        );
                    }

                    let mut outcomes = outcomes.into_iter();
                    let mut retry = Vec::new();
                    for record in pending {
                        match outcomes.next() {
                            Some(WriteOutcome::Written) => report.written += 1,
                            Some(WriteOutcome::Rejected(reason)) => {
                                warn!(
                                    chunk = chunk_index,
                                    key = %record.key(),
                                    reason = %reason,
                                    "Store rejected record"
                                );
                                report.failures.push(WriteFailure::new(
                                    &record,
                                    WriteFailureCause::RejectedByStore,
                                    reason,
                                ));
                            }
                            Some(WriteOutcome::Throttled) | None => retry.push(record),
                        }
                    }
                    pending = retry;
                }
                Err(StoreError::Transient(msg)) => {
                    warn!(chunk = chunk_index, attempt, error = %msg, "Chunk write failed transiently");
                    last_cause = msg;
                }
                Err(StoreError::InvalidRecord(reason)) => {
                    return Ok(GroupOutcome::Refused {
                        reason,
                        records: pending,
                    });
                }
                Err(err @ StoreError::Permanent(_)) => return Err(err),
            }

            if pending.is_empty() {
                return Ok(GroupOutcome::Done);
            }

            let Some(delay) = delays.next() else {
                warn!(
                    chunk = chunk_index,
                    attempts = attempt,
                    remaining = pending.len(),
                    "Retries exhausted, reporting records as failed"
                );
                report.failures.extend(pending.iter().map(|record| {
                    WriteFailure::new(record, WriteFailureCause::Throttled, last_cause.as_str())
                }));
                return Ok(GroupOutcome::Done);
            };

            debug!(
                chunk = chunk_index,
                attempt,
                pending = pending.len(),
                delay_ms = delay.as_millis() as u64,
                "Retrying chunk"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Drop every record whose key appears again later in the batch
fn collapse_duplicate_keys(records: Vec<ValidatedRecord>) -> Vec<ValidatedRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut kept: Vec<ValidatedRecord> = records
        .into_iter()
        .rev()
        .filter(|record| seen.insert(record.key().clone()))
        .collect();
    kept.reverse();
    kept
}

fn into_chunks(records: Vec<ValidatedRecord>, chunk_size: usize) -> Vec<Vec<ValidatedRecord>> {
    let mut chunks = Vec::with_capacity(records.len().div_ceil(chunk_size));
    let mut records = records.into_iter().peekable();
    while records.peek().is_some() {
        chunks.push(records.by_ref().take(chunk_size).collect());
    }
    chunks
}

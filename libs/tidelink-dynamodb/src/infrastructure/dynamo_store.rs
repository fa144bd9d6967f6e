//! DynamoDB Record Store Implementation
//!
//! This module implements the `RecordStore` trait with `BatchWriteItem`. Each
//! domain chunk becomes one request of `PutRequest`s; items DynamoDB reports as
//! unprocessed come back as `Throttled` so the store writer resends them.

use std::collections::HashSet;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::types::{PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use tidelink_domain::record::{RecordKey, ValidatedRecord};
use tidelink_domain::storage::{RecordStore, StoreError, WriteOutcome};
use tracing::{debug, error, info, instrument, warn};

use super::item::{build_item, key_of, KeyAttributes};

/// DynamoDB refuses `BatchWriteItem` requests with more than 25 items
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

/// DynamoDB-based implementation of the RecordStore port
///
/// ## Configuration
///
/// The store requires:
/// - An AWS SDK DynamoDB Client (configured with region, credentials, endpoint)
/// - The names of the table's partition and sort key attributes
///
/// ## Error Handling
///
/// - missing tables, access errors and unbuildable requests are
///   `StoreError::Permanent`
/// - validation errors are `StoreError::InvalidRecord`, so the writer can
///   narrow the request down to the offending item
/// - throttling, capacity and any other service-side error are
///   `StoreError::Transient`
#[derive(Clone)]
pub struct DynamoRecordStore {
    client: Client,
    keys: KeyAttributes,
}

impl DynamoRecordStore {
    /// Create a new DynamoDB record store
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use aws_sdk_dynamodb::Client;
    /// use tidelink_dynamodb::{DynamoRecordStore, KeyAttributes};
    ///
    /// # async fn example() {
    /// let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    /// let store = DynamoRecordStore::new(Client::new(&config), KeyAttributes::default());
    /// # }
    /// ```
    pub fn new(client: Client, keys: KeyAttributes) -> Self {
        info!(
            partition_key = %keys.partition,
            sort_key = %keys.sort,
            "Initializing DynamoRecordStore"
        );
        Self { client, keys }
    }

    /// Get the key attribute names
    pub fn keys(&self) -> &KeyAttributes {
        &self.keys
    }
}

impl RecordStore for DynamoRecordStore {
    fn max_batch_size(&self) -> usize {
        MAX_BATCH_WRITE_ITEMS
    }

    #[instrument(skip(self, table, records), fields(table = %table, records = records.len()))]
    fn upsert_batch(
        &self,
        table: &str,
        records: &[ValidatedRecord],
    ) -> impl std::future::Future<Output = Result<Vec<WriteOutcome>, StoreError>> + Send {
        let client = self.client.clone();
        let keys = self.keys.clone();
        let table = table.to_string();

        // Records that cannot become items are rejected up front and never sent
        let mut outcomes: Vec<Option<WriteOutcome>> = Vec::with_capacity(records.len());
        let mut requests = Vec::with_capacity(records.len());
        for record in records {
            let put = build_item(record, &keys).and_then(|item| {
                PutRequest::builder()
                    .set_item(Some(item))
                    .build()
                    .map_err(|err| err.to_string())
            });
            match put {
                Ok(put) => {
                    requests.push(WriteRequest::builder().put_request(put).build());
                    outcomes.push(None);
                }
                Err(reason) => {
                    warn!(key = %record.key(), reason = %reason, "Record cannot be written to DynamoDB");
                    outcomes.push(Some(WriteOutcome::Rejected(reason)));
                }
            }
        }
        let sent_keys: Vec<RecordKey> = records
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| outcome.is_none())
            .map(|(record, _)| record.key().clone())
            .collect();

        async move {
            if requests.is_empty() {
                return Ok(outcomes.into_iter().flatten().collect());
            }

            debug!(table = %table, items = requests.len(), "Sending BatchWriteItem");

            let output = client
                .batch_write_item()
                .request_items(table.clone(), requests)
                .send()
                .await
                .map_err(|err| {
                    let store_err = store_error(err);
                    match &store_err {
                        StoreError::Transient(msg) => warn!(table = %table, error = %msg, "BatchWriteItem failed transiently"),
                        StoreError::InvalidRecord(msg) => warn!(table = %table, error = %msg, "BatchWriteItem refused items"),
                        StoreError::Permanent(msg) => error!(table = %table, error = %msg, "BatchWriteItem failed"),
                    }
                    store_err
                })?;

            let unprocessed: HashSet<RecordKey> = output
                .unprocessed_items()
                .and_then(|items| items.get(&table))
                .map(|requests| {
                    requests
                        .iter()
                        .filter_map(|request| request.put_request())
                        .filter_map(|put| key_of(put.item(), &keys))
                        .collect()
                })
                .unwrap_or_default();

            if !unprocessed.is_empty() {
                warn!(table = %table, unprocessed = unprocessed.len(), "DynamoDB left items unprocessed");
            }

            Ok(merge_outcomes(outcomes, &sent_keys, &unprocessed))
        }
    }
}

/// Fill in outcomes for the records that were sent
///
/// `sent_keys` lists the keys of the `None` slots, in order.
fn merge_outcomes(
    outcomes: Vec<Option<WriteOutcome>>,
    sent_keys: &[RecordKey],
    unprocessed: &HashSet<RecordKey>,
) -> Vec<WriteOutcome> {
    let mut sent = sent_keys.iter();
    outcomes
        .into_iter()
        .map(|outcome| match outcome {
            Some(outcome) => outcome,
            None => match sent.next() {
                Some(key) if unprocessed.contains(key) => WriteOutcome::Throttled,
                _ => WriteOutcome::Written,
            },
        })
        .collect()
}

fn store_error(err: SdkError<BatchWriteItemError>) -> StoreError {
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ConstructionFailure(_) => StoreError::Permanent(message),
        SdkError::ServiceError(service) => classify_code(service.err().code(), message),
        // Throttling, timeouts, dispatch and response errors
        _ => StoreError::Transient(message),
    }
}

/// Codes that fail every request against the table, whatever its items
const TABLE_LEVEL_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "AccessDeniedException",
    "UnrecognizedClientException",
    "MissingAuthenticationTokenException",
    "ExpiredTokenException",
];

/// Codes caused by the content of at least one item in the request
const ITEM_LEVEL_CODES: &[&str] = &["ValidationException", "ItemCollectionSizeLimitExceededException"];

fn classify_code(code: Option<&str>, message: String) -> StoreError {
    match code {
        Some(code) if TABLE_LEVEL_CODES.contains(&code) => StoreError::Permanent(message),
        Some(code) if ITEM_LEVEL_CODES.contains(&code) => StoreError::InvalidRecord(message),
        _ => StoreError::Transient(message),
    }
}

//! Ingestion handler

use lambda_runtime::{Error, LambdaEvent};
use thiserror::Error;
use tidelink_domain::ingestion::{IngestionError, IngestionService, InvocationResult};
use tidelink_domain::storage::{ObjectFetcher, RecordStore};
use tracing::{error, info, info_span, warn, Instrument};

use crate::dto::notification::{NotificationError, S3Notification};
use crate::dto::response::IngestResponse;

/// Errors that fail the whole Lambda invocation
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("invalid notification: {0}")]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),
}

/// Handle one S3 notification delivered by the Lambda runtime
pub async fn ingest_handler<F, S>(
    service: &IngestionService<F, S>,
    event: LambdaEvent<S3Notification>,
) -> Result<IngestResponse, Error>
where
    F: ObjectFetcher,
    S: RecordStore,
{
    let (notification, context) = event.into_parts();
    let span = info_span!("lambda", request_id = %context.request_id);

    process_notification(service, notification)
        .instrument(span)
        .await
        .map_err(|err| Box::new(err) as Error)
}

/// Ingest every created object the notification announces, in order
pub async fn process_notification<F, S>(
    service: &IngestionService<F, S>,
    notification: S3Notification,
) -> Result<IngestResponse, HandlerError>
where
    F: ObjectFetcher,
    S: RecordStore,
{
    if notification.is_test_event() {
        info!("Received S3 test event, nothing to ingest");
        return Ok(IngestResponse::ok(Vec::new()));
    }

    if notification.records.is_empty() {
        error!("Received notification without records");
        return Err(NotificationError::Empty.into());
    }

    info!(records = notification.records.len(), "Received S3 notification");

    let mut results: Vec<InvocationResult> = Vec::with_capacity(notification.records.len());
    for record in &notification.records {
        if !record.is_object_created() {
            info!(
                event_name = record.event_name.as_deref().unwrap_or_default(),
                key = %record.s3.object.key,
                "Skipping non-creation event"
            );
            continue;
        }

        let outcome = match record.to_reference() {
            Ok(reference) => service.ingest(&reference).await.map_err(HandlerError::from),
            Err(err) => Err(err.into()),
        };

        match outcome {
            Ok(result) => results.push(result),
            Err(err) => {
                if !results.is_empty() {
                    warn!(
                        completed = results.len(),
                        results = %serde_json::to_string(&results).unwrap_or_default(),
                        "Notification aborted after earlier objects were ingested"
                    );
                }
                error!(error = %err, "Failed to ingest notification");
                return Err(err);
            }
        }
    }

    Ok(IngestResponse::ok(results))
}

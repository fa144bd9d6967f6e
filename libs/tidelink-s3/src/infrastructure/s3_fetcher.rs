//! S3 Object Fetcher Implementation
//!
//! This module implements the `ObjectFetcher` trait using AWS S3 as the backend.
//! It reads whole objects with `GetObject` and converts AWS errors to domain
//! fetch errors.

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, error, info, instrument, warn};
use tidelink_domain::storage::{FetchError, ObjectFetcher};

/// S3-based implementation of the ObjectFetcher port
///
/// The fetcher is bucket-agnostic: the bucket comes from each trigger event,
/// so one instance serves notifications from any bucket the function is
/// allowed to read.
///
/// ## Error Handling
///
/// - `NoSuchKey`, `NoSuchBucket` or HTTP 404 map to `FetchError::NotFound`
/// - `AccessDenied` or HTTP 403 map to `FetchError::AccessDenied`
/// - everything else maps to `FetchError::Unavailable`
#[derive(Clone)]
pub struct S3ObjectFetcher {
    client: Client,
}

impl S3ObjectFetcher {
    /// Create a new S3 object fetcher
    ///
    /// # Arguments
    ///
    /// * `client` - Configured AWS S3 client
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use aws_sdk_s3::Client;
    /// use tidelink_s3::infrastructure::S3ObjectFetcher;
    ///
    /// # async fn example() {
    /// let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    /// let fetcher = S3ObjectFetcher::new(Client::new(&config));
    /// # }
    /// ```
    pub fn new(client: Client) -> Self {
        info!("Initializing S3ObjectFetcher");
        Self { client }
    }
}

impl ObjectFetcher for S3ObjectFetcher {
    #[instrument(skip(self), fields(bucket = %store_location_id, key = %object_key))]
    fn fetch(
        &self,
        store_location_id: &str,
        object_key: &str,
    ) -> impl std::future::Future<Output = Result<Bytes, FetchError>> + Send {
        let client = self.client.clone();
        let bucket = store_location_id.to_string();
        let key = object_key.to_string();

        async move {
            debug!(key = %key, bucket = %bucket, "Fetching object from S3");
            let object = object_uri(&bucket, &key);

            match client.get_object().bucket(&bucket).key(&key).send().await {
                Ok(output) => match output.body.collect().await {
                    Ok(data) => {
                        let bytes = data.into_bytes();
                        info!(key = %key, size = bytes.len(), "Successfully fetched object from S3");
                        Ok(bytes)
                    }
                    Err(err) => {
                        error!(key = %key, error = ?err, "Failed to read S3 object body");
                        Err(FetchError::Unavailable(format!(
                            "failed to read body of {}: {}",
                            object, err
                        )))
                    }
                },
                Err(err) => {
                    let status = err.raw_response().map(|response| response.status().as_u16());
                    let service_err = err.into_service_error();
                    let fetch_err = classify(service_err.code(), status, object, &service_err.to_string());

                    match &fetch_err {
                        FetchError::Unavailable(_) => {
                            error!(key = %key, error = ?service_err, "S3 get_object failed")
                        }
                        _ => warn!(key = %key, error = %fetch_err, "S3 object is not readable"),
                    }

                    Err(fetch_err)
                }
            }
        }
    }
}

fn object_uri(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}

/// Map an S3 error code and HTTP status to a domain fetch error
fn classify(code: Option<&str>, status: Option<u16>, object: String, message: &str) -> FetchError {
    match (code, status) {
        (Some("NoSuchKey" | "NoSuchBucket" | "NotFound"), _) | (_, Some(404)) => {
            FetchError::NotFound(object)
        }
        (Some("AccessDenied" | "AllAccessDisabled" | "InvalidObjectState"), _) | (_, Some(403)) => {
            FetchError::AccessDenied(object)
        }
        _ => FetchError::Unavailable(format!("get_object failed for {}: {}", object, message)),
    }
}

//! S3 event notification DTOs

use std::string::FromUtf8Error;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tidelink_domain::ingestion::RawObjectReference;

/// Errors raised while reading a notification
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("notification carries no records")]
    Empty,

    #[error("object key {key:?} is not valid percent-encoded UTF-8: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: FromUtf8Error,
    },
}

/// S3 event notification as delivered to the function
#[derive(Debug, Clone, Deserialize)]
pub struct S3Notification {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
    /// Set on the `s3:TestEvent` S3 sends when a notification is configured
    #[serde(rename = "Event", default)]
    pub event: Option<String>,
}

impl S3Notification {
    /// Whether this is the test message sent when notifications are configured
    pub fn is_test_event(&self) -> bool {
        self.records.is_empty() && self.event.as_deref() == Some("s3:TestEvent")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3EventRecord {
    #[serde(default)]
    pub event_name: Option<String>,
    pub event_time: DateTime<Utc>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Object {
    /// URL-encoded, with `+` standing for a space
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl S3EventRecord {
    /// Whether the record announces a new object
    ///
    /// Records without an event name are treated as creations.
    pub fn is_object_created(&self) -> bool {
        self.event_name
            .as_deref()
            .map_or(true, |name| name.starts_with("ObjectCreated:"))
    }

    /// Build the reference the orchestrator works from
    pub fn to_reference(&self) -> Result<RawObjectReference, NotificationError> {
        let key = decode_key(&self.s3.object.key)?;
        let reference = RawObjectReference::new(self.s3.bucket.name.clone(), key, self.event_time);

        Ok(match self.s3.object.size {
            Some(size) => reference.with_size(size),
            None => reference,
        })
    }
}

/// Decode an object key as it appears in a notification
pub fn decode_key(raw: &str) -> Result<String, NotificationError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|key| key.into_owned())
        .map_err(|source| NotificationError::InvalidKey {
            key: raw.to_string(),
            source,
        })
}

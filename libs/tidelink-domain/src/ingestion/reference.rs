//! Trigger event reference

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the object whose arrival triggered an invocation
///
/// Created by the trigger adapter, consumed once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawObjectReference {
    /// Bucket-like container identifier
    store_location_id: String,

    /// Key of the object inside the container
    object_key: String,

    /// When the object store emitted the event
    event_timestamp: DateTime<Utc>,

    /// Object size as announced by the notification, if any
    size: Option<u64>,
}

impl RawObjectReference {
    pub fn new(
        store_location_id: impl Into<String>,
        object_key: impl Into<String>,
        event_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            store_location_id: store_location_id.into(),
            object_key: object_key.into(),
            event_timestamp,
            size: None,
        }
    }

    /// Attach the size announced by the notification
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn store_location_id(&self) -> &str {
        &self.store_location_id
    }

    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    pub fn event_timestamp(&self) -> &DateTime<Utc> {
        &self.event_timestamp
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }
}

impl fmt::Display for RawObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store_location_id, self.object_key)
    }
}

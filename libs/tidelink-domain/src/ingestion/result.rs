//! Invocation result returned to the host

use serde::Serialize;

use super::{InvocationId, RawObjectReference};
use crate::record::Rejection;
use crate::storage::WriteFailure;

/// Which object an invocation processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSummary {
    pub bucket: String,
    pub key: String,
}

impl From<&RawObjectReference> for ObjectSummary {
    fn from(reference: &RawObjectReference) -> Self {
        Self {
            bucket: reference.store_location_id().to_string(),
            key: reference.object_key().to_string(),
        }
    }
}

/// Outcome of one completed invocation
///
/// Serializes to the JSON shape the host logs:
/// `{"accepted":1,"rejected":0,"failedWrites":0,"rejections":[],"durationMs":3,...}`.
/// The core never persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub invocation_id: InvocationId,
    pub object: ObjectSummary,
    /// Records that passed validation
    pub accepted: usize,
    /// Records that failed validation
    pub rejected: usize,
    /// Accepted records that could not be persisted
    pub failed_writes: usize,
    /// Accepted records collapsed into a later record with the same key
    pub superseded: usize,
    /// Rejected records, ordered by source index
    pub rejections: Vec<Rejection>,
    /// Failed writes, ordered by source index
    pub failures: Vec<WriteFailure>,
    pub duration_ms: u64,
}

impl InvocationResult {
    /// Whether every record of the batch made it into the store
    pub fn is_clean(&self) -> bool {
        self.rejected == 0 && self.failed_writes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RejectionReason;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_result_json_shape() {
        let reference = RawObjectReference::new("raw", "batch.json", Utc::now());
        let result = InvocationResult {
            invocation_id: InvocationId::new(),
            object: ObjectSummary::from(&reference),
            accepted: 2,
            rejected: 1,
            failed_writes: 0,
            superseded: 0,
            rejections: vec![Rejection::for_field(1, RejectionReason::WrongType, "timestamp")],
            failures: vec![],
            duration_ms: 12,
        };

        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["accepted"], json!(2));
        assert_eq!(value["rejected"], json!(1));
        assert_eq!(value["failedWrites"], json!(0));
        assert_eq!(value["durationMs"], json!(12));
        assert_eq!(value["object"], json!({"bucket": "raw", "key": "batch.json"}));
        assert_eq!(
            value["rejections"],
            json!([{"index": 1, "reason": "WrongType", "field": "timestamp"}])
        );
        assert!(!result.is_clean());
    }
}

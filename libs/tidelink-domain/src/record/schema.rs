//! Record schema and per-record validation
//!
//! Validation is a pure function of one candidate and the schema: no state is
//! carried between records, so the order in which a batch is validated never
//! changes the verdicts.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CandidateRecord, RecordKey, Rejection, RejectionReason, ValidatedRecord};

/// Shape of an acceptable input record
///
/// The defaults describe sensor readings of the form
/// `{"device_id": "d1", "timestamp": "2026-02-01T10:00:00Z", "value": 42}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Field holding the partition key (default: `device_id`)
    pub partition_field: String,

    /// Field holding the RFC 3339 timestamp used as sort key (default: `timestamp`)
    pub sort_field: String,

    /// Other fields that must be present, of any type (default: `value`)
    pub required_fields: Vec<String>,
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            partition_field: "device_id".to_string(),
            sort_field: "timestamp".to_string(),
            required_fields: vec!["value".to_string()],
        }
    }
}

impl RecordSchema {
    /// Validate one candidate record
    ///
    /// Checks run in a fixed order and the first failure wins:
    /// 1. the partition field must be a non-empty string or an integer
    /// 2. the sort field must be a non-empty RFC 3339 timestamp string
    /// 3. every additional required field must be present
    ///
    /// Unknown fields are carried over to the `ValidatedRecord` untouched.
    ///
    /// # Errors
    ///
    /// Returns a `Rejection` carrying the source index, the reason and the
    /// offending field name.
    pub fn validate(&self, candidate: CandidateRecord) -> Result<ValidatedRecord, Rejection> {
        let index = candidate.source_index();

        let partition_key = partition_key(candidate.field(&self.partition_field))
            .map_err(|reason| Rejection::for_field(index, reason, &self.partition_field))?;

        let (sort_key, recorded_at) = sort_key(candidate.field(&self.sort_field))
            .map_err(|reason| Rejection::for_field(index, reason, &self.sort_field))?;

        if let Some(missing) = self
            .required_fields
            .iter()
            .find(|name| candidate.field(name).is_none())
        {
            return Err(Rejection::for_field(
                index,
                RejectionReason::MissingRequiredField,
                missing,
            ));
        }

        Ok(ValidatedRecord::new(
            RecordKey::new(partition_key, sort_key),
            recorded_at,
            candidate.into_fields(),
            index,
        ))
    }
}

/// Derive the partition key from its raw field value
///
/// Integers are accepted and rendered in decimal since that conversion is
/// lossless; fractional numbers are not.
fn partition_key(value: Option<&Value>) -> Result<String, RejectionReason> {
    match value {
        None => Err(RejectionReason::MissingRequiredField),
        Some(Value::String(s)) if s.trim().is_empty() => Err(RejectionReason::EmptyKey),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Ok(u.to_string())
            } else {
                Err(RejectionReason::WrongType)
            }
        }
        Some(_) => Err(RejectionReason::WrongType),
    }
}

/// Derive the sort key, keeping the timestamp string exactly as received
fn sort_key(value: Option<&Value>) -> Result<(String, DateTime<FixedOffset>), RejectionReason> {
    match value {
        None => Err(RejectionReason::MissingRequiredField),
        Some(Value::String(s)) if s.trim().is_empty() => Err(RejectionReason::EmptyKey),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|parsed| (s.clone(), parsed))
            .map_err(|_| RejectionReason::WrongType),
        Some(_) => Err(RejectionReason::WrongType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(index: usize, value: Value) -> CandidateRecord {
        match value {
            Value::Object(map) => CandidateRecord::new(index, map),
            _ => panic!("fixture must be an object"),
        }
    }

    fn reject(value: Value) -> Rejection {
        RecordSchema::default()
            .validate(candidate(0, value))
            .expect_err("record should be rejected")
    }

    #[test]
    fn test_valid_record_is_accepted() {
        let record = RecordSchema::default()
            .validate(candidate(
                4,
                json!({"device_id": "d1", "timestamp": "2026-02-01T10:00:00Z", "value": 42}),
            ))
            .unwrap();

        assert_eq!(record.partition_key(), "d1");
        assert_eq!(record.sort_key(), "2026-02-01T10:00:00Z");
        assert_eq!(record.source_index(), 4);
        assert_eq!(record.recorded_at().timestamp(), 1_769_940_000);
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let record = RecordSchema::default()
            .validate(candidate(
                0,
                json!({
                    "device_id": "d1",
                    "timestamp": "2026-02-01T10:00:00+02:00",
                    "value": 1.5,
                    "firmware": {"version": "3.1"},
                    "tags": ["a", "b"]
                }),
            ))
            .unwrap();

        assert_eq!(record.fields()["firmware"], json!({"version": "3.1"}));
        assert_eq!(record.fields()["tags"], json!(["a", "b"]));
        assert_eq!(record.fields()["value"], json!(1.5));
    }

    #[test]
    fn test_integer_partition_key_is_rendered_in_decimal() {
        let record = RecordSchema::default()
            .validate(candidate(
                0,
                json!({"device_id": 1234, "timestamp": "2026-02-01T10:00:00Z", "value": 0}),
            ))
            .unwrap();

        assert_eq!(record.partition_key(), "1234");
        // The original field keeps its JSON type
        assert_eq!(record.fields()["device_id"], json!(1234));
    }

    #[test]
    fn test_missing_partition_key() {
        let rejection = reject(json!({"timestamp": "2026-02-01T10:00:00Z", "value": 1}));

        assert_eq!(rejection.reason, RejectionReason::MissingRequiredField);
        assert_eq!(rejection.field.as_deref(), Some("device_id"));
    }

    #[test]
    fn test_null_partition_key_counts_as_missing() {
        let rejection = reject(json!({"device_id": null, "timestamp": "2026-02-01T10:00:00Z", "value": 1}));
        assert_eq!(rejection.reason, RejectionReason::MissingRequiredField);
    }

    #[test]
    fn test_empty_partition_key() {
        let rejection = reject(json!({"device_id": "  ", "timestamp": "2026-02-01T10:00:00Z", "value": 1}));
        assert_eq!(rejection.reason, RejectionReason::EmptyKey);
    }

    #[test]
    fn test_partition_key_wrong_types() {
        for bad in [json!(1.5), json!(true), json!(["d1"]), json!({"id": "d1"})] {
            let rejection = reject(json!({"device_id": bad, "timestamp": "2026-02-01T10:00:00Z", "value": 1}));
            assert_eq!(rejection.reason, RejectionReason::WrongType, "device_id = {bad}");
        }
    }

    #[test]
    fn test_missing_timestamp() {
        let rejection = reject(json!({"device_id": "d1", "value": 1}));

        assert_eq!(rejection.reason, RejectionReason::MissingRequiredField);
        assert_eq!(rejection.field.as_deref(), Some("timestamp"));
    }

    #[test]
    fn test_empty_timestamp() {
        let rejection = reject(json!({"device_id": "d1", "timestamp": "", "value": 1}));
        assert_eq!(rejection.reason, RejectionReason::EmptyKey);
    }

    #[test]
    fn test_unrecognized_timestamp_formats() {
        for bad in [
            json!("2026-02-01 10:00:00"),
            json!("2026-02-01T10:00:00"),
            json!("01/02/2026"),
            json!(1_769_940_000),
        ] {
            let rejection = reject(json!({"device_id": "d1", "timestamp": bad, "value": 1}));
            assert_eq!(rejection.reason, RejectionReason::WrongType, "timestamp = {bad}");
        }
    }

    #[test]
    fn test_missing_additional_required_field() {
        let rejection = reject(json!({"device_id": "d1", "timestamp": "2026-02-01T10:00:00Z"}));

        assert_eq!(rejection.reason, RejectionReason::MissingRequiredField);
        assert_eq!(rejection.field.as_deref(), Some("value"));
    }

    #[test]
    fn test_partition_field_checked_before_sort_field() {
        let rejection = reject(json!({"device_id": "", "timestamp": 12}));
        assert_eq!(rejection.reason, RejectionReason::EmptyKey);
        assert_eq!(rejection.field.as_deref(), Some("device_id"));
    }

    #[test]
    fn test_custom_schema() {
        let schema = RecordSchema {
            partition_field: "sensor".to_string(),
            sort_field: "observed_at".to_string(),
            required_fields: vec![],
        };

        let record = schema
            .validate(candidate(0, json!({"sensor": "s-9", "observed_at": "2026-02-01T10:00:00-05:00"})))
            .unwrap();

        assert_eq!(record.key(), &RecordKey::new("s-9", "2026-02-01T10:00:00-05:00"));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let schema = RecordSchema::default();
        let inputs = [
            json!({"device_id": "d1", "timestamp": "2026-02-01T10:00:00Z", "value": 42}),
            json!({"device_id": "d1", "timestamp": "yesterday", "value": 42}),
            json!({"timestamp": "2026-02-01T10:00:00Z"}),
        ];

        for input in inputs {
            let first = schema.validate(candidate(1, input.clone()));
            let second = schema.validate(candidate(1, input));
            assert_eq!(first, second);
        }
    }
}

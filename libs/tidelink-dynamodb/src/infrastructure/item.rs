//! Conversion between validated records and DynamoDB items

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::Value;
use tidelink_domain::record::{RecordKey, RecordSchema, ValidatedRecord};

/// A DynamoDB item
pub(crate) type Item = HashMap<String, AttributeValue>;

/// DynamoDB limits a single item to 400 KB
pub(crate) const MAX_ITEM_BYTES: usize = 400 * 1024;

/// Largest magnitude a DynamoDB number can hold
const MAX_NUMBER_MAGNITUDE: f64 = 9.999_999_999_999_999e125;

/// Smallest non-zero magnitude a DynamoDB number can hold
const MIN_NUMBER_MAGNITUDE: f64 = 1e-130;

/// Names of the table's key attributes
///
/// Both are string (`S`) attributes; the adapter always writes the derived
/// keys as strings so integer device identifiers land under the same key type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttributes {
    pub partition: String,
    pub sort: String,
}

impl KeyAttributes {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

impl Default for KeyAttributes {
    fn default() -> Self {
        Self::from(&RecordSchema::default())
    }
}

impl From<&RecordSchema> for KeyAttributes {
    fn from(schema: &RecordSchema) -> Self {
        Self::new(schema.partition_field.clone(), schema.sort_field.clone())
    }
}

/// Build the item to put for `record`
///
/// All record fields are carried over; the key attributes are overwritten with
/// the derived string keys.
///
/// # Errors
///
/// Returns a description of the problem if the fields cannot be represented
/// as a DynamoDB item or the item is too large.
pub(crate) fn build_item(record: &ValidatedRecord, keys: &KeyAttributes) -> Result<Item, String> {
    let encoded_len = serde_json::to_vec(record.fields())
        .map_err(|err| format!("failed to encode record: {}", err))?
        .len();
    if encoded_len > MAX_ITEM_BYTES {
        return Err(format!(
            "item size ({} bytes) exceeds DynamoDB limit ({} bytes)",
            encoded_len, MAX_ITEM_BYTES
        ));
    }

    for (name, value) in record.fields() {
        check_numbers(name, value)?;
    }

    let mut item: Item = serde_dynamo::to_item(record.fields())
        .map_err(|err| format!("failed to convert record to item: {}", err))?;

    item.insert(
        keys.partition.clone(),
        AttributeValue::S(record.partition_key().to_string()),
    );
    item.insert(keys.sort.clone(), AttributeValue::S(record.sort_key().to_string()));

    Ok(item)
}

/// Refuse numbers DynamoDB would reject with a `ValidationException`
fn check_numbers(path: &str, value: &Value) -> Result<(), String> {
    match value {
        Value::Number(number) if number.is_f64() => {
            let magnitude = number.as_f64().map_or(0.0, f64::abs);
            if magnitude != 0.0 && !(MIN_NUMBER_MAGNITUDE..=MAX_NUMBER_MAGNITUDE).contains(&magnitude) {
                return Err(format!(
                    "number {} in field {:?} is outside the DynamoDB number range",
                    number, path
                ));
            }
            Ok(())
        }
        Value::Array(values) => values
            .iter()
            .enumerate()
            .try_for_each(|(i, value)| check_numbers(&format!("{}[{}]", path, i), value)),
        Value::Object(fields) => fields
            .iter()
            .try_for_each(|(name, value)| check_numbers(&format!("{}.{}", path, name), value)),
        _ => Ok(()),
    }
}

/// Read the record key back out of an item returned by DynamoDB
pub(crate) fn key_of(item: &Item, keys: &KeyAttributes) -> Option<RecordKey> {
    let partition = item.get(&keys.partition)?.as_s().ok()?;
    let sort = item.get(&keys.sort)?.as_s().ok()?;
    Some(RecordKey::new(partition.as_str(), sort.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tidelink_domain::record::CandidateRecord;

    fn validated(value: Value) -> ValidatedRecord {
        let fields = match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        };
        RecordSchema::default()
            .validate(CandidateRecord::new(0, fields))
            .unwrap()
    }

    #[test]
    fn test_item_carries_all_fields() {
        let record = validated(json!({
            "device_id": "d1",
            "timestamp": "2026-02-01T10:00:00Z",
            "value": 42,
            "unit": "celsius",
            "ok": true
        }));

        let item = build_item(&record, &KeyAttributes::default()).unwrap();

        assert_eq!(item["device_id"], AttributeValue::S("d1".to_string()));
        assert_eq!(item["timestamp"], AttributeValue::S("2026-02-01T10:00:00Z".to_string()));
        assert_eq!(item["value"], AttributeValue::N("42".to_string()));
        assert_eq!(item["unit"], AttributeValue::S("celsius".to_string()));
        assert_eq!(item["ok"], AttributeValue::Bool(true));
    }

    #[test]
    fn test_integer_partition_key_is_written_as_string() {
        let record = validated(json!({"device_id": 77, "timestamp": "2026-02-01T10:00:00Z", "value": 1}));

        let item = build_item(&record, &KeyAttributes::default()).unwrap();

        assert_eq!(item["device_id"], AttributeValue::S("77".to_string()));
    }

    #[test]
    fn test_custom_key_attribute_names() {
        let record = validated(json!({"device_id": "d1", "timestamp": "2026-02-01T10:00:00Z", "value": 1}));
        let keys = KeyAttributes::new("pk", "sk");

        let item = build_item(&record, &keys).unwrap();

        assert_eq!(item["pk"], AttributeValue::S("d1".to_string()));
        assert_eq!(item["sk"], AttributeValue::S("2026-02-01T10:00:00Z".to_string()));
        assert_eq!(key_of(&item, &keys), Some(record.key().clone()));
    }

    #[test]
    fn test_oversized_item_is_refused() {
        let blob = "x".repeat(MAX_ITEM_BYTES + 1);
        let record = validated(json!({"device_id": "d1", "timestamp": "2026-02-01T10:00:00Z", "value": blob}));

        let err = build_item(&record, &KeyAttributes::default()).unwrap_err();
        assert!(err.contains("exceeds DynamoDB limit"));
    }

    #[test]
    fn test_key_of_requires_string_keys() {
        let mut item = Item::new();
        item.insert("device_id".to_string(), AttributeValue::N("1".to_string()));
        item.insert("timestamp".to_string(), AttributeValue::S("t".to_string()));

        assert_eq!(key_of(&item, &KeyAttributes::default()), None);
    }

    #[test]
    fn test_out_of_range_number_is_refused() {
        let record = validated(json!({"device_id": "d1", "timestamp": "2026-02-01T10:00:00Z", "value": 1e300}));

        let err = build_item(&record, &KeyAttributes::default()).unwrap_err();
        assert!(err.contains("\"value\""));
        assert!(err.contains("outside the DynamoDB number range"));
    }

    #[test]
    fn test_nested_numbers_are_checked() {
        let record = validated(json!({
            "device_id": "d1",
            "timestamp": "2026-02-01T10:00:00Z",
            "value": 1,
            "samples": [0.5, {"tiny": 1e-200}]
        }));

        let err = build_item(&record, &KeyAttributes::default()).unwrap_err();
        assert!(err.contains("samples[1].tiny"));
    }

    #[test]
    fn test_numbers_in_range_are_kept() {
        let record = validated(json!({
            "device_id": "d1",
            "timestamp": "2026-02-01T10:00:00Z",
            "value": -2.5e125,
            "zero": 0.0,
            "big": u64::MAX
        }));

        let item = build_item(&record, &KeyAttributes::default()).unwrap();
        assert!(matches!(item["value"], AttributeValue::N(_)));
        assert!(matches!(item["zero"], AttributeValue::N(_)));
    }
}

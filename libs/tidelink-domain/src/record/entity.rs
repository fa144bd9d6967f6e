//! Domain entities for records flowing through one invocation
//!
//! A `CandidateRecord` is what the batch parser hands over: one JSON object
//! from the input array, untouched. A `ValidatedRecord` is a candidate that
//! passed the schema and therefore carries a non-empty `RecordKey`.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field map of a single record, in input order
pub type Fields = Map<String, Value>;

/// One element of an input batch that decoded as a key-value object
///
/// Candidates are ephemeral: they only live for the duration of the
/// invocation that parsed them.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    /// Position of the element in the input array
    source_index: usize,

    /// All fields of the element, known or not
    fields: Fields,
}

impl CandidateRecord {
    /// Create a candidate from its array position and field map
    pub fn new(source_index: usize, fields: Fields) -> Self {
        Self {
            source_index,
            fields,
        }
    }

    /// Get the original position of this record in the batch
    pub fn source_index(&self) -> usize {
        self.source_index
    }

    /// Get all fields of the record
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Look up a single field, treating JSON `null` as absent
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|value| !value.is_null())
    }

    /// Consume the candidate and return its field map
    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

/// Upsert identity of a record in the table store
///
/// Two records with the same key overwrite each other; this is what makes
/// redelivery of the same object harmless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    partition_key: String,
    sort_key: String,
}

impl RecordKey {
    /// Create a key from its two components
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }

    /// Get the partition component (e.g. the device identifier)
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Get the sort component (the record timestamp as received)
    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.partition_key, self.sort_key)
    }
}

/// A candidate record narrowed to the required schema
///
/// Invariant: both key components are present and non-empty. Only
/// [`RecordSchema::validate`](crate::record::RecordSchema::validate) builds
/// these.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    key: RecordKey,

    /// Parsed form of the sort key
    recorded_at: DateTime<FixedOffset>,

    /// Every field of the original record, unmodified
    fields: Fields,

    source_index: usize,
}

impl ValidatedRecord {
    pub(crate) fn new(
        key: RecordKey,
        recorded_at: DateTime<FixedOffset>,
        fields: Fields,
        source_index: usize,
    ) -> Self {
        Self {
            key,
            recorded_at,
            fields,
            source_index,
        }
    }

    /// Get the upsert key
    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    /// Get the partition key
    pub fn partition_key(&self) -> &str {
        self.key.partition_key()
    }

    /// Get the sort key
    pub fn sort_key(&self) -> &str {
        self.key.sort_key()
    }

    /// Get the parsed record timestamp
    pub fn recorded_at(&self) -> &DateTime<FixedOffset> {
        &self.recorded_at
    }

    /// Get the fields to persist
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Get the original position of this record in the batch
    pub fn source_index(&self) -> usize {
        self.source_index
    }
}

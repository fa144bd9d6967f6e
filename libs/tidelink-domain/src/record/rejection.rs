//! Rejection verdicts for records that fail validation

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a single record was not accepted
///
/// Rejections are recovered locally: they are recorded in the invocation
/// result and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
    /// A required field is absent or `null`
    MissingRequiredField,
    /// A field is present but has the wrong type or format
    WrongType,
    /// A key field is present but empty
    EmptyKey,
    /// The array element is not a key-value object at all
    MalformedBatch,
}

impl RejectionReason {
    /// Stable name used in logs and the invocation result
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRequiredField => "MissingRequiredField",
            Self::WrongType => "WrongType",
            Self::EmptyKey => "EmptyKey",
            Self::MalformedBatch => "MalformedBatch",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected record, identified by its position in the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Position of the record in the input array
    pub index: usize,

    pub reason: RejectionReason,

    /// Field that caused the rejection, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Rejection {
    /// Create a rejection tied to a specific field
    pub fn for_field(index: usize, reason: RejectionReason, field: impl Into<String>) -> Self {
        Self {
            index,
            reason,
            field: Some(field.into()),
        }
    }

    /// Create a rejection for an element that could not be read as a record
    pub fn malformed(index: usize) -> Self {
        Self {
            index,
            reason: RejectionReason::MalformedBatch,
            field: None,
        }
    }
}

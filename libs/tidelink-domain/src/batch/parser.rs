//! JSON array batch parsing

use serde_json::Value;

use crate::ingestion::IngestionError;
use crate::record::CandidateRecord;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One element of a parsed batch, in input order
#[derive(Debug, Clone, PartialEq)]
pub enum BatchElement {
    /// The element is a key-value object and goes on to validation
    Candidate(CandidateRecord),

    /// The element cannot be read as a record at all (number, string, array...)
    Uninterpretable {
        index: usize,
        kind: &'static str,
    },
}

impl BatchElement {
    /// Position of the element in the input array
    pub fn index(&self) -> usize {
        match self {
            Self::Candidate(candidate) => candidate.source_index(),
            Self::Uninterpretable { index, .. } => *index,
        }
    }
}

/// The elements of one batch, in the order they appeared
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBatch {
    elements: Vec<BatchElement>,
}

impl ParsedBatch {
    /// Number of elements in the batch
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the batch had no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate over elements without consuming the batch
    pub fn elements(&self) -> impl Iterator<Item = &BatchElement> {
        self.elements.iter()
    }
}

impl IntoIterator for ParsedBatch {
    type Item = BatchElement;
    type IntoIter = std::vec::IntoIter<BatchElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

/// Parse raw bytes as a JSON array of records
///
/// An empty array is a valid, empty batch. Elements that are not JSON objects
/// do not fail the batch: they come back as [`BatchElement::Uninterpretable`]
/// so the caller can reject them individually.
///
/// # Errors
///
/// Returns `IngestionError::MalformedBatch` if the bytes are not valid JSON or
/// the top-level value is not an array.
pub fn parse_batch(bytes: &[u8]) -> Result<ParsedBatch, IngestionError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| IngestionError::malformed_batch(format!("invalid JSON: {}", err)))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(IngestionError::malformed_batch(format!(
                "expected a JSON array at the top level, found {}",
                kind_of(&other)
            )))
        }
    };

    let elements = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => BatchElement::Candidate(CandidateRecord::new(index, fields)),
            other => BatchElement::Uninterpretable {
                index,
                kind: kind_of(&other),
            },
        })
        .collect();

    Ok(ParsedBatch { elements })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

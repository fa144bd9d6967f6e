//! Batch parser
//!
//! Turns the raw bytes of one uploaded object into an ordered sequence of
//! candidate records.

mod parser;

pub use parser::{parse_batch, BatchElement, ParsedBatch};

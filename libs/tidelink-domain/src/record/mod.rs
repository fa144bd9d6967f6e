//! Record model
//!
//! Defines what an acceptable input record looks like and produces
//! accept/reject verdicts for individual records.

mod entity;
mod rejection;
mod schema;

pub use entity::{CandidateRecord, Fields, RecordKey, ValidatedRecord};
pub use rejection::{Rejection, RejectionReason};
pub use schema::RecordSchema;

//! # TideLink DynamoDB Adapter
//!
//! Implements the domain's [`RecordStore`](tidelink_domain::RecordStore) port
//! with DynamoDB `BatchWriteItem` requests.

pub mod infrastructure;

pub use infrastructure::{DynamoRecordStore, KeyAttributes};

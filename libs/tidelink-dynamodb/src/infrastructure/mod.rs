//! Infrastructure adapters backed by AWS DynamoDB

mod dynamo_store;
mod item;

pub use dynamo_store::DynamoRecordStore;
pub use item::KeyAttributes;

//! Startup configuration for the ingestion service

use std::time::Duration;

use super::IngestionError;
use crate::record::RecordSchema;
use crate::storage::RetryPolicy;

/// Configuration for the ingestion service
///
/// Built once per process and handed to [`IngestionService::new`](super::IngestionService::new);
/// nothing in the core reads configuration from the environment.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Target table identifier (default: `ProcessedRecords`)
    pub table_name: String,
    /// Maximum records per store request (default: 25)
    pub max_chunk_size: usize,
    /// Write attempts per chunk, first attempt included (default: 4)
    pub max_attempts: u32,
    /// Delay before the first retry (default: 50ms)
    pub backoff_base: Duration,
    /// Upper bound on any retry delay (default: 2s)
    pub backoff_cap: Duration,
    /// Chunks written concurrently (default: 4)
    pub max_concurrent_chunks: usize,
    /// Largest raw object accepted, in bytes (default: 64MB)
    pub max_object_bytes: usize,
    /// Shape of an acceptable record
    pub schema: RecordSchema,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            table_name: "ProcessedRecords".to_string(),
            max_chunk_size: 25,
            max_attempts: 4,
            backoff_base: Duration::from_millis(50),
            backoff_cap: Duration::from_secs(2),
            max_concurrent_chunks: 4,
            max_object_bytes: 64 * 1024 * 1024, // 64MB
            schema: RecordSchema::default(),
        }
    }
}

impl IngestionConfig {
    /// Create a default configuration targeting the given table
    pub fn for_table(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Check the configuration for values the service cannot work with
    ///
    /// # Errors
    ///
    /// Returns `IngestionError::ConfigError` describing the first invalid value.
    pub fn validate(&self) -> Result<(), IngestionError> {
        if self.table_name.trim().is_empty() {
            return Err(IngestionError::config_error("table name must not be empty"));
        }
        if self.max_chunk_size == 0 {
            return Err(IngestionError::config_error("max chunk size must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(IngestionError::config_error("max attempts must be at least 1"));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(IngestionError::config_error(
                "max concurrent chunks must be at least 1",
            ));
        }
        if self.max_object_bytes == 0 {
            return Err(IngestionError::config_error("max object size must be at least 1 byte"));
        }
        if self.backoff_base > self.backoff_cap {
            return Err(IngestionError::config_error(format!(
                "backoff base ({:?}) exceeds backoff cap ({:?})",
                self.backoff_base, self.backoff_cap
            )));
        }
        if self.schema.partition_field == self.schema.sort_field {
            return Err(IngestionError::config_error(
                "partition and sort fields must be different",
            ));
        }
        Ok(())
    }

    /// Retry policy the store writer applies to each chunk
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff_base, self.backoff_cap)
    }
}

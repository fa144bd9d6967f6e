//! Process configuration read from the environment
//!
//! Read once at cold start; the resulting `IngestionConfig` is handed to the
//! service and never re-read mid-invocation.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tidelink_domain::ingestion::{IngestionConfig, IngestionError};

pub const TABLE: &str = "TIDELINK_TABLE";
pub const MAX_CHUNK_SIZE: &str = "TIDELINK_MAX_CHUNK_SIZE";
pub const MAX_ATTEMPTS: &str = "TIDELINK_MAX_ATTEMPTS";
pub const BACKOFF_BASE_MS: &str = "TIDELINK_BACKOFF_BASE_MS";
pub const BACKOFF_CAP_MS: &str = "TIDELINK_BACKOFF_CAP_MS";
pub const MAX_CONCURRENT_CHUNKS: &str = "TIDELINK_MAX_CONCURRENT_CHUNKS";
pub const MAX_OBJECT_BYTES: &str = "TIDELINK_MAX_OBJECT_BYTES";
pub const PARTITION_FIELD: &str = "TIDELINK_PARTITION_FIELD";
pub const SORT_FIELD: &str = "TIDELINK_SORT_FIELD";
pub const REQUIRED_FIELDS: &str = "TIDELINK_REQUIRED_FIELDS";
pub const S3_FORCE_PATH_STYLE: &str = "TIDELINK_S3_FORCE_PATH_STYLE";
pub const DYNAMODB_ENDPOINT: &str = "TIDELINK_DYNAMODB_ENDPOINT";

/// Errors raised while reading the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Ingestion(#[from] IngestionError),
}

/// Everything the binary needs to wire the service
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ingestion: IngestionConfig,
    /// Path-style S3 addressing, for MinIO or LocalStack
    pub s3_force_path_style: bool,
    /// DynamoDB endpoint override, for DynamoDB Local
    pub dynamodb_endpoint: Option<String>,
}

impl AppConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`
    ///
    /// Unset and blank variables fall back to the `IngestionConfig` defaults,
    /// except for the table name which is required.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = IngestionConfig::default();

        let mut ingestion = IngestionConfig {
            table_name: get(TABLE).ok_or(ConfigError::Missing(TABLE))?,
            max_chunk_size: parse(&get, MAX_CHUNK_SIZE, defaults.max_chunk_size)?,
            max_attempts: parse(&get, MAX_ATTEMPTS, defaults.max_attempts)?,
            backoff_base: parse_millis(&get, BACKOFF_BASE_MS, defaults.backoff_base)?,
            backoff_cap: parse_millis(&get, BACKOFF_CAP_MS, defaults.backoff_cap)?,
            max_concurrent_chunks: parse(&get, MAX_CONCURRENT_CHUNKS, defaults.max_concurrent_chunks)?,
            max_object_bytes: parse(&get, MAX_OBJECT_BYTES, defaults.max_object_bytes)?,
            schema: defaults.schema,
        };

        if let Some(field) = get(PARTITION_FIELD) {
            ingestion.schema.partition_field = field.trim().to_string();
        }
        if let Some(field) = get(SORT_FIELD) {
            ingestion.schema.sort_field = field.trim().to_string();
        }
        if let Some(fields) = lookup(REQUIRED_FIELDS) {
            ingestion.schema.required_fields = fields
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect();
        }

        ingestion.validate()?;

        Ok(Self {
            ingestion,
            s3_force_path_style: parse(&get, S3_FORCE_PATH_STYLE, false)?,
            dynamodb_endpoint: get(DYNAMODB_ENDPOINT),
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            name,
            reason: err.to_string(),
            value,
        }),
    }
}

fn parse_millis(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse(get, name, default_ms).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_table_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing(TABLE))));
        assert!(matches!(config(&[(TABLE, "  ")]), Err(ConfigError::Missing(TABLE))));
    }

    #[test]
    fn test_defaults() {
        let config = config(&[(TABLE, "ProcessedRecords")]).unwrap();

        assert_eq!(config.ingestion.table_name, "ProcessedRecords");
        assert_eq!(config.ingestion.max_chunk_size, 25);
        assert_eq!(config.ingestion.schema.partition_field, "device_id");
        assert_eq!(config.ingestion.schema.required_fields, vec!["value".to_string()]);
        assert!(!config.s3_force_path_style);
        assert!(config.dynamodb_endpoint.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            (TABLE, "Readings"),
            (MAX_CHUNK_SIZE, "10"),
            (MAX_ATTEMPTS, "6"),
            (BACKOFF_BASE_MS, "20"),
            (BACKOFF_CAP_MS, "500"),
            (PARTITION_FIELD, "sensor"),
            (SORT_FIELD, "observed_at"),
            (REQUIRED_FIELDS, "reading, unit,"),
            (S3_FORCE_PATH_STYLE, "true"),
            (DYNAMODB_ENDPOINT, "http://localhost:8000"),
        ])
        .unwrap();

        assert_eq!(config.ingestion.max_chunk_size, 10);
        assert_eq!(config.ingestion.max_attempts, 6);
        assert_eq!(config.ingestion.backoff_base, Duration::from_millis(20));
        assert_eq!(config.ingestion.backoff_cap, Duration::from_millis(500));
        assert_eq!(config.ingestion.schema.sort_field, "observed_at");
        assert_eq!(
            config.ingestion.schema.required_fields,
            vec!["reading".to_string(), "unit".to_string()]
        );
        assert!(config.s3_force_path_style);
        assert_eq!(config.dynamodb_endpoint.as_deref(), Some("http://localhost:8000"));
    }

    #[test]
    fn test_empty_required_fields_clears_the_list() {
        let config = config(&[(TABLE, "Readings"), (REQUIRED_FIELDS, "")]).unwrap();
        assert!(config.ingestion.schema.required_fields.is_empty());
    }

    #[test]
    fn test_unparseable_number() {
        let err = config(&[(TABLE, "Readings"), (MAX_ATTEMPTS, "many")]).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { name: MAX_ATTEMPTS, .. }));
        assert!(err.to_string().contains("many"));
    }

    #[test]
    fn test_invalid_combination_is_rejected() {
        let err = config(&[(TABLE, "Readings"), (BACKOFF_BASE_MS, "5000"), (BACKOFF_CAP_MS, "100")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Ingestion(IngestionError::ConfigError(_))));
    }
}

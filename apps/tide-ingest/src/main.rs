//! TideIngest - Event-Triggered Record Ingestion
//!
//! Lambda function invoked by S3 object-created notifications. Each announced
//! batch object is fetched, validated record by record and upserted into
//! DynamoDB.

#![recursion_limit = "256"]

mod config;
mod dto;
mod handlers;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use lambda_runtime::service_fn;
use tidelink_domain::ingestion::IngestionService;
use tidelink_dynamodb::{DynamoRecordStore, KeyAttributes};
use tidelink_s3::S3ObjectFetcher;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    // CloudWatch stamps time and source itself
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .without_time()
        .init();

    info!("Starting TideIngest function");

    let config = AppConfig::from_env()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_force_path_style)
        .build();
    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    let mut dynamo_config = aws_sdk_dynamodb::config::Builder::from(&aws_config);
    if let Some(endpoint) = &config.dynamodb_endpoint {
        info!(endpoint = %endpoint, "Using DynamoDB endpoint override");
        dynamo_config = dynamo_config.endpoint_url(endpoint);
    }
    let dynamo_client = aws_sdk_dynamodb::Client::from_conf(dynamo_config.build());

    let fetcher = S3ObjectFetcher::new(s3_client);
    let store = DynamoRecordStore::new(dynamo_client, KeyAttributes::from(&config.ingestion.schema));
    let service = Arc::new(IngestionService::new(fetcher, store, config.ingestion)?);

    lambda_runtime::run(service_fn(move |event| {
        let service = Arc::clone(&service);
        async move { handlers::ingestion::ingest_handler(service.as_ref(), event).await }
    }))
    .await
    .map_err(|err| anyhow!("lambda runtime failed: {:?}", err))?;

    Ok(())
}

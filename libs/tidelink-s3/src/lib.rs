//! # TideLink S3 Adapter
//!
//! Implements the domain's [`ObjectFetcher`](tidelink_domain::ObjectFetcher)
//! port on top of the AWS S3 SDK.

pub mod infrastructure;

pub use infrastructure::S3ObjectFetcher;

//! Infrastructure adapters backed by AWS S3

mod s3_fetcher;

pub use s3_fetcher::S3ObjectFetcher;

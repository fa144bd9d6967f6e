//! Ingestion domain module
//!
//! This module contains the orchestrator that drives one invocation end to end,
//! together with the configuration, identifiers and result it works with.

mod config;
mod error;
mod ids;
mod phase;
mod reference;
mod result;
mod service;

pub use config::IngestionConfig;
pub use error::{IngestionError, Result};
pub use ids::InvocationId;
pub use phase::Phase;
pub use reference::RawObjectReference;
pub use result::{InvocationResult, ObjectSummary};
pub use service::IngestionService;

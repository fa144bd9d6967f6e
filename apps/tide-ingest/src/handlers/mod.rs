//! Lambda handlers

pub mod ingestion;

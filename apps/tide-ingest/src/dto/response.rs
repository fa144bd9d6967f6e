//! Handler response DTO

use serde::Serialize;
use tidelink_domain::ingestion::InvocationResult;

/// Response returned to the Lambda runtime
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub status_code: u16,
    /// One entry per processed notification record
    pub results: Vec<InvocationResult>,
}

impl IngestResponse {
    pub fn ok(results: Vec<InvocationResult>) -> Self {
        Self {
            status_code: 200,
            results,
        }
    }
}

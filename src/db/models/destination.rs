use serde::{Deserialize, Serialize};

/// Destination with how many moments currently point at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSummary {
    pub id: String,
    pub name: String,
    pub moment_count: u64,
}

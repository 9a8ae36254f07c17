use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub moment_id: String,
    /// 1-based position inside the moment.
    pub order_id: u32,
    pub name: String,
    pub description: String,
    pub start_date_and_time: DateTime<Utc>,
    /// Minutes.
    pub duration: u32,
    pub end_date_and_time: DateTime<Utc>,
}

/// A step about to be written, with its derived times already computed.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub id: String,
    pub order_id: u32,
    pub name: String,
    pub description: String,
    pub start_date_and_time: DateTime<Utc>,
    pub duration: u32,
    pub end_date_and_time: DateTime<Utc>,
}

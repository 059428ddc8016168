// crates/batchboard/src/api/models.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub timestamp: NaiveDateTime,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

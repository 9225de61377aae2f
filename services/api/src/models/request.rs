//! Explanation request audit records

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Audit record of one explanation call
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub request_id: i64,
    pub video_id: String,
    pub image_id: Option<String>,
    pub session_id: String,
    pub lang: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRequestRecord {
    pub video_id: String,
    pub image_id: Option<String>,
    pub session_id: String,
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageCount {
    pub lang: String,
    pub count: i64,
}

/// Aggregate over all audit records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatistics {
    pub total_requests: i64,
    /// Most requested language first
    pub by_language: Vec<LanguageCount>,
    pub with_image: i64,
    pub without_image: i64,
}

//! Uploaded screenshot models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored image record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub image_id: String,
    pub video_id: String,
    /// Location of the file on disk
    pub file_path: String,
    pub original_filename: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
}

/// New image record
#[derive(Debug, Clone)]
pub struct NewImage {
    pub image_id: String,
    pub video_id: String,
    pub file_path: String,
    pub original_filename: String,
    pub file_size: i64,
}

/// Response for an image upload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub image_id: String,
    pub filename: String,
    pub size: i64,
}

//! Collected video references

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cited web result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// Reference blob stored for a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDocument {
    /// Query the collection was started with
    pub query: String,
    pub timestamp: DateTime<Utc>,
    /// Queries the search backend actually issued
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub items: Vec<ReferenceItem>,
}

/// Backend that produced a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    GeminiGrounding,
    GeminiTextFallback,
    GoogleCustomSearch,
}

/// How the sources were pulled out of the backend response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extraction {
    GroundingMetadata,
    NumberedList,
    UrlLabel,
    BareUrl,
    SearchApi,
}

/// Provenance of a stored reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMetadata {
    pub source: ReferenceSource,
    pub extraction: Extraction,
    pub query: String,
    /// Number of sources found, before truncation
    pub results_count: usize,
    #[serde(default)]
    pub search_queries: Vec<String>,
}

/// Stored reference row
#[derive(Debug, Clone)]
pub struct Reference {
    pub id: i64,
    pub video_id: String,
    pub document: ReferenceDocument,
    pub metadata: ReferenceMetadata,
    pub created_at: DateTime<Utc>,
}

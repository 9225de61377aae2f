//! Explanation request and response payloads

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A subtitle line with its position in the video
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleLine {
    pub text: String,
    /// Seconds from the start of the video
    pub timestamp: f64,
    /// Sound or visual effects shown with the line
    #[serde(default)]
    pub non_verbal_cues: Option<Vec<String>>,
}

impl SubtitleLine {
    pub fn cues(&self) -> &[String] {
        self.non_verbal_cues.as_deref().unwrap_or_default()
    }
}

/// Explanation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub video_id: String,
    pub image_id: Option<String>,
    pub selected_text: String,
    pub timestamp: f64,
    #[serde(default = "default_language")]
    pub language: String,
    pub platform: Option<String>,
    pub title: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    /// Prior subtitle lines, oldest first
    #[serde(default)]
    pub context: Option<Vec<SubtitleLine>>,
    pub current_subtitle: Option<SubtitleLine>,
}

fn default_language() -> String {
    "en".to_string()
}

impl ExplainRequest {
    pub fn context_lines(&self) -> &[SubtitleLine] {
        self.context.as_deref().unwrap_or_default()
    }

    pub fn current_cues(&self) -> &[String] {
        self.current_subtitle
            .as_ref()
            .map(SubtitleLine::cues)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    AiAnalysis,
    VideoContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationSource {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub title: String,
}

/// A moment of the video the explanation points at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationReference {
    pub timestamp: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub text: String,
    pub sources: Vec<ExplanationSource>,
    pub references: Vec<ExplanationReference>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResponseData {
    pub explanation: Explanation,
    pub cached: bool,
    /// Milliseconds spent answering
    pub response_time: u64,
}

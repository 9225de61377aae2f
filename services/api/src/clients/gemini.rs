//! Gemini generation client
//!
//! Calls the `generateContent` REST endpoint with a text prompt, an optional
//! inline image and, for reference collection, the Google Search tool.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Generation service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Deadline of one generation call
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_model_name() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

impl GeminiConfig {
    /// Create a new GeminiConfig from environment variables
    ///
    /// # Environment Variables
    /// - `GEMINI_API_KEY`: API key (required to build a client)
    /// - `GEMINI_MODEL_NAME`: Model (default: gemini-2.5-flash)
    /// - `GEMINI_BASE_URL`: REST base URL
    /// - `GEMINI_TIMEOUT_SECONDS`: Call deadline (default: 60)
    pub fn from_env() -> Result<Self, common::config::ConfigError> {
        common::config::from_env("GEMINI")
    }
}

/// Generation errors
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The call exceeded its deadline
    #[error("Generation request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    /// The model answered without any text
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    #[error("Missing API key")]
    MissingApiKey,
}

impl From<reqwest::Error> for GenerationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Http(error.without_url())
        }
    }
}

/// Image sent along with the prompt
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// One generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
    pub temperature: f32,
    /// Attach the Google Search tool
    pub grounding: bool,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            temperature,
            grounding: false,
        }
    }
}

/// Grounding information returned with a search-backed answer
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub web_search_queries: Vec<String>,
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    pub grounding_supports: Vec<GroundingSupport>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebChunk {
    pub uri: Option<String>,
    pub title: Option<String>,
}

/// Part of the answer backed by one or more chunks
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSupport {
    pub segment: Option<Segment>,
    #[serde(default)]
    pub grounding_chunk_indices: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Segment {
    pub text: Option<String>,
}

/// Generated answer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResponse {
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

/// Text (and image) generation port
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;
}

// Gemini API structs (private)

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

/// Gemini client over the REST API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: GeminiConfig,
        base_url: String,
    ) -> Result<Self, GenerationError> {
        Self::new(GeminiConfig { base_url, ..config })
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model_name
        );

        let mut parts = vec![Part {
            text: Some(&request.prompt),
            inline_data: None,
        }];
        if let Some(image) = &request.image {
            parts.push(Part {
                text: None,
                inline_data: Some(Blob {
                    mime_type: &image.mime_type,
                    data: STANDARD.encode(&image.data),
                }),
            });
        }

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
            tools: if request.grounding {
                vec![Tool {
                    google_search: GoogleSearch {},
                }]
            } else {
                Vec::new()
            },
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            if status == StatusCode::GATEWAY_TIMEOUT {
                return Err(GenerationError::Timeout);
            }

            let error_body = response.text().await.unwrap_or_default();
            let (code, message) = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");
            return Err(GenerationError::Api { code, message });
        }

        let payload: GenerateContentResponse = response.json().await?;

        let Some(candidate) = payload.candidates.into_iter().next() else {
            let reason = payload
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(GenerationError::EmptyResponse(reason));
        };

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.trim().is_empty() && candidate.grounding_metadata.is_none() {
            let reason = candidate
                .finish_reason
                .unwrap_or_else(|| "no text".to_string());
            return Err(GenerationError::EmptyResponse(reason));
        }

        Ok(GenerationResponse {
            text,
            grounding: candidate.grounding_metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(timeout_seconds: u64) -> GeminiConfig {
        GeminiConfig {
            api_key: "test-api-key".to_string(),
            model_name: "gemini-2.5-flash".to_string(),
            base_url: default_base_url(),
            timeout_seconds,
        }
    }

    async fn client(server: &MockServer, timeout_seconds: u64) -> GeminiClient {
        GeminiClient::with_base_url(test_config(timeout_seconds), server.uri())
            .expect("Failed to create client")
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let config = GeminiConfig {
            api_key: "  ".to_string(),
            ..test_config(60)
        };
        assert!(matches!(
            GeminiClient::new(config),
            Err(GenerationError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_and_image() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header(API_KEY_HEADER, "test-api-key"))
            .and(body_partial_json(json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "Explain this"},
                        {"inlineData": {"mimeType": "image/png", "data": "AQID"}}
                    ]
                }],
                "generationConfig": {"temperature": 0.7}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "It is "}, {"text": "a joke."}]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = GenerationRequest {
            image: Some(InlineImage {
                mime_type: "image/png".to_string(),
                data: vec![1, 2, 3],
            }),
            ..GenerationRequest::text("Explain this", 0.7)
        };
        let response = client(&server, 60).await.generate(request).await.unwrap();

        assert_eq!(response.text, "It is a joke.");
        assert!(response.grounding.is_none());
    }

    #[tokio::test]
    async fn test_grounded_generation_parses_metadata() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"tools": [{"googleSearch": {}}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "Show A is a drama."}]},
                    "groundingMetadata": {
                        "webSearchQueries": ["Show A plot"],
                        "groundingChunks": [
                            {"web": {"uri": "https://a.example", "title": "a.example"}}
                        ],
                        "groundingSupports": [
                            {"segment": {"text": "Show A is a drama."}, "groundingChunkIndices": [0]}
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let request = GenerationRequest {
            grounding: true,
            ..GenerationRequest::text("search", 0.3)
        };
        let response = client(&server, 60).await.generate(request).await.unwrap();

        let grounding = response.grounding.unwrap();
        assert_eq!(grounding.web_search_queries, vec!["Show A plot"]);
        assert_eq!(
            grounding.grounding_chunks[0].web.as_ref().unwrap().uri.as_deref(),
            Some("https://a.example")
        );
        assert_eq!(grounding.grounding_supports[0].grounding_chunk_indices, vec![0]);
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let result = client(&server, 60)
            .await
            .generate(GenerationRequest::text("hi", 0.7))
            .await;

        match result {
            Err(GenerationError::Api { code, message }) => {
                assert_eq!(code, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(3))
                    .set_body_json(json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let result = client(&server, 1)
            .await
            .generate(GenerationRequest::text("hi", 0.7))
            .await;

        assert!(matches!(result, Err(GenerationError::Timeout)));
    }

    #[tokio::test]
    async fn test_deadline_exceeded_status_is_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let result = client(&server, 60)
            .await
            .generate(GenerationRequest::text("hi", 0.7))
            .await;

        assert!(matches!(result, Err(GenerationError::Timeout)));
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_empty_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let result = client(&server, 60)
            .await
            .generate(GenerationRequest::text("hi", 0.7))
            .await;

        assert!(matches!(result, Err(GenerationError::EmptyResponse(reason)) if reason == "SAFETY"));
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        let config = GeminiConfig {
            api_key: "SECRET-KEY-123".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            ..test_config(5)
        };
        let client = GeminiClient::new(config).unwrap();

        let error = client
            .generate(GenerationRequest::text("hi", 0.7))
            .await
            .unwrap_err();

        assert!(matches!(error, GenerationError::Http(_)));
        assert!(!error.to_string().contains("SECRET-KEY-123"));
        assert!(!format!("{:?}", error).contains("SECRET-KEY-123"));
    }
}

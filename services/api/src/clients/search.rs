//! Google Custom Search client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "DocentAI/1.0";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Search service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub api_key: String,
    /// Programmable search engine id (`cx`)
    #[serde(default)]
    pub engine_id: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Results per query, 1 to 10
    #[serde(default = "default_num_results")]
    pub num_results: u8,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_api_url() -> String {
    "https://www.googleapis.com/customsearch/v1".to_string()
}

fn default_num_results() -> u8 {
    1
}

fn default_timeout_seconds() -> u64 {
    10
}

impl SearchConfig {
    /// Create a new SearchConfig from environment variables
    ///
    /// # Environment Variables
    /// - `GOOGLE_SEARCH_API_KEY`, `GOOGLE_SEARCH_ENGINE_ID`: credentials
    /// - `GOOGLE_SEARCH_API_URL`: endpoint
    /// - `GOOGLE_SEARCH_NUM_RESULTS`: results per query (default: 1)
    /// - `GOOGLE_SEARCH_TIMEOUT_SECONDS`: request timeout (default: 10)
    pub fn from_env() -> Result<Self, common::config::ConfigError> {
        common::config::from_env("GOOGLE_SEARCH")
    }
}

/// Search errors
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing search API key or engine id")]
    MissingCredentials,
}

impl From<reqwest::Error> for SearchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            SearchError::Timeout
        } else {
            SearchError::Http(error.without_url())
        }
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

/// Web search port
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, SearchError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchErrorResponse {
    error: Option<SearchErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SearchErrorDetail {
    code: u16,
    message: String,
}

/// Custom Search JSON API client
#[derive(Debug, Clone)]
pub struct CustomSearchClient {
    client: Client,
    config: SearchConfig,
}

impl CustomSearchClient {
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        if config.api_key.trim().is_empty() || config.engine_id.trim().is_empty() {
            return Err(SearchError::MissingCredentials);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, config })
    }

    fn num_results(&self) -> u8 {
        self.config.num_results.clamp(1, 10)
    }
}

#[async_trait]
impl SearchClient for CustomSearchClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, SearchError> {
        let num = self.num_results().to_string();

        let response = self
            .client
            .get(&self.config.api_url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .query(&[
                ("cx", self.config.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let (code, message) = serde_json::from_str::<SearchErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Custom search API error");
            return Err(SearchError::Api { code, message });
        }

        let payload: SearchResponse = response.json().await?;
        Ok(payload.items)
    }
}

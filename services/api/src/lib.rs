//! Subtitle explanation service
//!
//! Stores video and screenshot metadata, collects web references for videos
//! in the background and answers explanation requests by composing a prompt
//! for the generation model.

pub mod clients;
pub mod error;
pub mod explanations;
pub mod models;
pub mod references;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod storage;

use serde::Deserialize;

pub use state::AppState;

/// Backend used to collect video references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceBackend {
    /// Generation model with the search tool attached
    Grounded,
    /// Plain custom search API
    CustomSearch,
    Disabled,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the prompt files
    #[serde(default = "default_prompts_path")]
    pub prompts_path: String,
    #[serde(default = "default_reference_backend")]
    pub reference_backend: ReferenceBackend,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_prompts_path() -> String {
    "./config/prompts".to_string()
}

fn default_reference_backend() -> ReferenceBackend {
    ReferenceBackend::Grounded
}

impl ServerConfig {
    /// Create a new ServerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `API_HOST`: Bind address (default: 0.0.0.0)
    /// - `API_PORT`: Bind port (default: 8001)
    /// - `API_PROMPTS_PATH`: Prompt directory (default: ./config/prompts)
    /// - `API_REFERENCE_BACKEND`: `grounded`, `custom_search` or `disabled`
    pub fn from_env() -> Result<Self, common::config::ConfigError> {
        common::config::from_env("API")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

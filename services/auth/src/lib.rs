//! Session token service
//!
//! Issues signed tokens bound to an external profile identity, reusing the
//! profile's live session when there is one, and verifies them for the
//! other services.

pub mod client_ip;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod sweeper;

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    jwt::JwtService, middleware::SessionVerifier, repositories::SessionRepository,
    session::SessionManager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session_manager: SessionManager,
    pub verifier: SessionVerifier,
}

impl AppState {
    /// Wire the session manager and verifier over one pool
    pub fn new(db_pool: SqlitePool, jwt_service: JwtService) -> Self {
        let sessions = SessionRepository::new(db_pool.clone());
        Self {
            session_manager: SessionManager::new(jwt_service.clone(), sessions.clone()),
            verifier: SessionVerifier::new(jwt_service, sessions),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Cron schedule (with seconds) of the expired session sweep
    #[serde(default = "default_sweep_schedule")]
    pub sweep_schedule: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_sweep_schedule() -> String {
    "0 0 * * * *".to_string()
}

impl ServerConfig {
    /// Create a new ServerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_HOST`: Bind address (default: 0.0.0.0)
    /// - `AUTH_PORT`: Bind port (default: 8000)
    /// - `AUTH_SWEEP_SCHEDULE`: Sweep cron schedule (default: hourly)
    pub fn from_env() -> Result<Self, common::config::ConfigError> {
        common::config::from_env("AUTH")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

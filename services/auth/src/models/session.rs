//! Session model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata stored alongside a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// External profile the session is bound to
    pub profile_id: String,
    /// Last client address seen for this session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
}

/// Session entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub token: Option<String>,
    pub metadata: SessionMetadata,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Profile the session belongs to
    pub fn profile_id(&self) -> &str {
        &self.metadata.profile_id
    }
}

/// New session creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub session_id: String,
    pub token: String,
    pub metadata: SessionMetadata,
    /// Lifetime from now, in hours
    pub ttl_hours: i64,
}

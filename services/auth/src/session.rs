//! Token reuse coordination
//!
//! Every credential request either refreshes the profile's live session or
//! opens a new one. Client address drift on reuse is reported to an
//! observer and never changes the outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::{
    client_ip::is_known_address,
    jwt::{JwtService, TokenError},
    models::{NewSession, Session, SessionMetadata},
    repositories::{SessionRepository, SessionStoreError},
};

/// Outcome of a credential request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub token: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    /// True when an existing session was refreshed
    pub reused: bool,
}

/// Issuance errors
#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("Failed to sign token: {0}")]
    Token(#[from] TokenError),

    #[error("Failed to persist session: {0}")]
    Store(#[from] SessionStoreError),
}

/// Address change seen while reusing a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressChange<'a> {
    pub profile_id: &'a str,
    pub session_id: &'a str,
    pub previous: &'a str,
    pub current: &'a str,
}

/// Hook notified when a reused session is requested from a new address
pub trait AddressChangeObserver: Send + Sync {
    fn address_changed(&self, change: &AddressChange<'_>);
}

/// Default observer, emits a warning event
#[derive(Debug, Default)]
pub struct LogAddressChange;

impl AddressChangeObserver for LogAddressChange {
    fn address_changed(&self, change: &AddressChange<'_>) {
        warn!(
            profile_id = %change.profile_id,
            session_id = %change.session_id,
            original_ip = %change.previous,
            current_ip = %change.current,
            "IP changed for session"
        );
    }
}

/// Per-profile locks serialising issuance within this process
#[derive(Clone, Default)]
struct ProfileLocks {
    entries: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

struct ProfileGuard {
    profile_id: String,
    locks: ProfileLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ProfileLocks {
    async fn acquire(&self, profile_id: &str) -> ProfileGuard {
        let lock = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries
                .entry(profile_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        ProfileGuard {
            profile_id: profile_id.to_string(),
            locks: self.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut entries = self.locks.entries.lock().unwrap_or_else(|e| e.into_inner());
        let idle = entries
            .get(&self.profile_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            entries.remove(&self.profile_id);
        }
    }
}

/// Session manager deciding between session reuse and creation
#[derive(Clone)]
pub struct SessionManager {
    jwt_service: JwtService,
    sessions: SessionRepository,
    observer: Arc<dyn AddressChangeObserver>,
    locks: ProfileLocks,
}

impl SessionManager {
    /// Create a new session manager logging address changes
    pub fn new(jwt_service: JwtService, sessions: SessionRepository) -> Self {
        Self {
            jwt_service,
            sessions,
            observer: Arc::new(LogAddressChange),
            locks: ProfileLocks::default(),
        }
    }

    /// Replace the address change observer
    pub fn with_observer(mut self, observer: Arc<dyn AddressChangeObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Issue a token for a profile, reusing its live session when there is one
    ///
    /// The steps are not transactional: a failure after the token update may
    /// leave the previous expiry in place.
    pub async fn issue_token(
        &self,
        profile_id: &str,
        client_ip: &str,
    ) -> Result<TokenGrant, IssuanceError> {
        let _guard = self.locks.acquire(profile_id).await;

        match self.sessions.get_valid_by_profile(profile_id).await? {
            Some(session) => self.reuse_session(session, client_ip).await,
            None => self.create_session(profile_id, client_ip).await,
        }
    }

    async fn reuse_session(
        &self,
        session: Session,
        client_ip: &str,
    ) -> Result<TokenGrant, IssuanceError> {
        let profile_id = session.profile_id();
        let issued = self
            .jwt_service
            .issue(profile_id, Some(&session.session_id))?;

        self.sessions
            .update_token(&session.session_id, &issued.token)
            .await?;
        self.sessions
            .extend_expiration(&session.session_id, self.jwt_service.session_ttl_hours())
            .await?;

        let previous = session.metadata.client_ip.as_deref();
        if is_known_address(client_ip) && previous != Some(client_ip) {
            let metadata = SessionMetadata {
                profile_id: profile_id.to_string(),
                client_ip: Some(client_ip.to_string()),
            };
            self.sessions
                .update_metadata(&session.session_id, &metadata)
                .await?;
        }

        info!(
            profile_id = %profile_id,
            session_id = %session.session_id,
            "Reusing existing session"
        );

        if let Some(previous) = previous.filter(|ip| is_known_address(ip)) {
            if is_known_address(client_ip) && previous != client_ip {
                self.observer.address_changed(&AddressChange {
                    profile_id,
                    session_id: &session.session_id,
                    previous,
                    current: client_ip,
                });
            }
        }

        Ok(TokenGrant {
            token: issued.token,
            session_id: issued.session_id,
            expires_at: issued.expires_at,
            reused: true,
        })
    }

    async fn create_session(
        &self,
        profile_id: &str,
        client_ip: &str,
    ) -> Result<TokenGrant, IssuanceError> {
        let issued = self.jwt_service.issue(profile_id, None)?;

        let payload = NewSession {
            session_id: issued.session_id.clone(),
            token: issued.token.clone(),
            metadata: SessionMetadata {
                profile_id: profile_id.to_string(),
                client_ip: Some(client_ip.to_string()),
            },
            ttl_hours: self.jwt_service.session_ttl_hours(),
        };
        self.sessions.create(&payload).await?;

        info!(
            profile_id = %profile_id,
            session_id = %issued.session_id,
            client_ip = %client_ip,
            "Created new session"
        );

        Ok(TokenGrant {
            token: issued.token,
            session_id: issued.session_id,
            expires_at: issued.expires_at,
            reused: false,
        })
    }

    /// Revoke a session
    pub async fn revoke(&self, session_id: &str) -> Result<bool, IssuanceError> {
        let deleted = self.sessions.delete(session_id).await?;
        info!(session_id = %session_id, deleted, "Revoked session");
        Ok(deleted)
    }

    /// Number of live sessions
    pub async fn active_sessions(&self) -> Result<i64, IssuanceError> {
        Ok(self.sessions.count_active().await?)
    }
}

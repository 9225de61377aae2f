//! Middleware for bearer token validation and authentication
//!
//! A request is authenticated when its token verifies and the session it
//! names is still live in the session store.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use tracing::{error, warn};

use crate::{error::AuthError, jwt::JwtService, repositories::SessionRepository};

/// Authenticated session, inserted into request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub session_id: String,
    pub profile_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Verifies bearer credentials against the token secret and session store
#[derive(Clone)]
pub struct SessionVerifier {
    jwt_service: JwtService,
    sessions: SessionRepository,
}

impl SessionVerifier {
    /// Create a new verifier
    pub fn new(jwt_service: JwtService, sessions: SessionRepository) -> Self {
        Self {
            jwt_service,
            sessions,
        }
    }

    /// Verify the raw value of an Authorization header
    pub async fn verify_header(&self, header: Option<&str>) -> Result<AuthSession, AuthError> {
        let token = bearer_token(header)?;

        let claims = self.jwt_service.verify(token).map_err(|e| {
            warn!("Rejected token: {}", e);
            AuthError::from(e)
        })?;

        let session = self
            .sessions
            .get_valid(&claims.session_id)
            .await
            .map_err(|e| {
                error!("Failed to load session {}: {}", claims.session_id, e);
                AuthError::InternalServerError
            })?
            .filter(|session| session.profile_id() == claims.profile_id)
            .ok_or(AuthError::SessionNotFound)?;

        Ok(AuthSession {
            session_id: session.session_id,
            profile_id: claims.profile_id,
            expires_at: session.expires_at,
        })
    }
}

/// Extract the token from a `Bearer <token>` header value
///
/// The scheme is matched case-insensitively and the value must be exactly
/// two whitespace-separated parts.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::InvalidHeaderFormat),
    }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(verifier): State<SessionVerifier>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map(str::to_owned))
        .transpose()
        .map_err(|_| AuthError::InvalidHeaderFormat)?;

    let session = verifier.verify_header(header.as_deref()).await?;
    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

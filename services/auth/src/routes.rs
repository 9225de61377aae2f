//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use tracing::{error, info};

use crate::{
    AppState,
    client_ip::{ClientIp, is_local_ip},
    error::AuthError,
    jwt::format_expiry,
    middleware::{AuthSession, auth_middleware},
};

/// Header carrying the caller-declared profile identity
pub const PROFILE_HEADER: &str = "x-profile-id";

/// Response for token issuance
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
    pub expires_at: String,
    pub session_id: String,
    pub reused: bool,
}

/// Client address diagnostics
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpInfoResponse {
    pub client_ip: String,
    pub is_local: bool,
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
    pub peer_addr: Option<String>,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/auth/revoke", post(revoke))
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/token", post(issue_token))
        .route("/api/debug/ip", get(debug_ip))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, AuthError> {
    let active_sessions = state.session_manager.active_sessions().await.map_err(|e| {
        error!("Failed to count active sessions: {}", e);
        AuthError::InternalServerError
    })?;

    Ok(Json(json!({
        "status": "healthy",
        "service": "auth-service",
        "activeSessions": active_sessions,
    })))
}

/// Token issuance endpoint
///
/// Reuses the live session of the declared profile when there is one.
pub async fn issue_token(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let profile_id = headers
        .get(PROFILE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AuthError::BadRequest("Missing X-Profile-ID header".to_string()))?;

    info!("Token request for profile {} from {}", profile_id, client_ip);

    let grant = state
        .session_manager
        .issue_token(profile_id, &client_ip)
        .await
        .map_err(|e| {
            error!("Failed to issue token for profile {}: {}", profile_id, e);
            AuthError::IssuanceFailed
        })?;

    let response = TokenResponse {
        success: true,
        token: grant.token,
        expires_at: format_expiry(grant.expires_at),
        session_id: grant.session_id,
        reused: grant.reused,
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Revoke the caller's session
pub async fn revoke(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .session_manager
        .revoke(&session.session_id)
        .await
        .map_err(|e| {
            error!("Failed to revoke session {}: {}", session.session_id, e);
            AuthError::InternalServerError
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "Session revoked",
    })))
}

/// Client address diagnostics endpoint
pub async fn debug_ip(
    ClientIp(client_ip): ClientIp,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    Json(IpInfoResponse {
        is_local: is_local_ip(&client_ip),
        client_ip,
        forwarded_for: header("x-forwarded-for"),
        real_ip: header("x-real-ip"),
        peer_addr: peer.map(|ConnectInfo(addr)| addr.to_string()),
    })
}

//! Custom error types for the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::jwt::TokenError;

/// Custom error type for authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header format. Use: Bearer <token>")]
    InvalidHeaderFormat,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Session not found or expired")]
    SessionNotFound,

    /// Bad request with message
    #[error("{0}")]
    BadRequest(String),

    #[error("Failed to issue token")]
    IssuanceFailed,

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl AuthError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader
            | AuthError::InvalidHeaderFormat
            | AuthError::TokenExpired
            | AuthError::InvalidToken
            | AuthError::SessionNotFound => StatusCode::UNAUTHORIZED,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::IssuanceFailed | AuthError::InternalServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Expired => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        (self.status_code(), body).into_response()
    }
}

//! JWT service for session token issuance and verification
//!
//! Tokens are HMAC-signed with a shared secret and bind a session id to an
//! external profile id. Verification is stateless: whether the session is
//! still live is checked separately against the session store.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// JWT configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Shared secret used to sign and verify tokens
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    /// Signing algorithm name, HMAC family only
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Token lifetime in days
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,
}

fn default_secret_key() -> String {
    "your-secret-key-change-this-in-production".to_string()
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_expiration_days() -> i64 {
    7
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET_KEY`: Signing secret (default: development placeholder)
    /// - `JWT_ALGORITHM`: `HS256`, `HS384` or `HS512` (default: `HS256`)
    /// - `JWT_EXPIRATION_DAYS`: Token lifetime in days (default: 7)
    pub fn from_env() -> Result<Self, TokenError> {
        common::config::from_env("JWT").map_err(|e| TokenError::Configuration(e.to_string()))
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Session the token belongs to
    pub session_id: String,
    /// External profile identity
    pub profile_id: String,
    /// Issued at time (seconds since epoch)
    pub iat: i64,
    /// Expiration time (seconds since epoch)
    pub exp: i64,
    /// Unique token id, keeps tokens minted in the same second distinct
    pub jti: String,
    /// Token type discriminator
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Access token
    Access,
}

/// A freshly signed token and the session it is bound to
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Expiry as ISO-8601 UTC with a trailing `Z`
    pub fn expires_at_iso(&self) -> String {
        format_expiry(self.expires_at)
    }
}

/// Format an expiry instant the way clients receive it
pub fn format_expiry(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Token errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token signature is fine but its expiry has passed
    #[error("Token has expired")]
    Expired,

    /// Any other decoding, signature or claim failure
    #[error("Invalid token: {0}")]
    Malformed(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Invalid JWT configuration: {0}")]
    Configuration(String),
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self, TokenError> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|e| TokenError::Configuration(format!("{}: {}", config.algorithm, e)))?;

        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(TokenError::Configuration(format!(
                "Unsupported algorithm {}, expected an HMAC algorithm",
                config.algorithm
            )));
        }
        if config.secret_key.is_empty() {
            return Err(TokenError::Configuration(
                "JWT_SECRET_KEY must not be empty".to_string(),
            ));
        }
        if config.expiration_days <= 0 {
            return Err(TokenError::Configuration(format!(
                "JWT_EXPIRATION_DAYS must be positive, got {}",
                config.expiration_days
            )));
        }

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(JwtService {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            header: Header::new(algorithm),
            validation,
            config,
        })
    }

    /// Issue a token for a profile
    ///
    /// When `session_id` is given the token is bound to that session,
    /// otherwise a new session id is generated.
    pub fn issue(
        &self,
        profile_id: &str,
        session_id: Option<&str>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(profile_id, session_id, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`
    pub fn issue_at(
        &self,
        profile_id: &str,
        session_id: Option<&str>,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let expires_at = issued_at + Duration::days(self.config.expiration_days);

        let claims = Claims {
            session_id: session_id.clone(),
            profile_id: profile_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Access,
        };

        let token = encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            session_id,
            expires_at,
        })
    }

    /// Verify a token and return the claims
    ///
    /// Never consults the session store.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            })
    }

    /// Session lifetime in hours, matching the token lifetime
    pub fn session_ttl_hours(&self) -> i64 {
        self.config.expiration_days * 24
    }
}

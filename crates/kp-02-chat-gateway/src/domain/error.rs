//! Chat Gateway error types with numeric error codes.
//!
//! Authentication failures keep the codes older clients already match on
//! (1000-1002). Conversation failures use the 2000 range.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kp_01_conversation_store::ConversationError;
use serde::Serialize;
use thiserror::Error;

/// Gateway error codes
pub mod codes {
    // Authentication (1000 range)
    pub const TOKEN_MISSING: u16 = 1000;
    pub const TOKEN_INVALID: u16 = 1001;
    pub const CLIENT_INVALID: u16 = 1002;

    // Conversations (2000 range)
    pub const INVALID_ADDRESS: u16 = 2000;
    pub const FORBIDDEN_GROUP: u16 = 2001;
    pub const INVALID_REQUEST: u16 = 2002;
    pub const NOT_FOUND: u16 = 2003;
    pub const UNAVAILABLE: u16 = 2004;
    pub const INTERNAL: u16 = 2005;
}

/// Error body returned to HTTP clients: `{"code": 1000, "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: u16,
    #[serde(skip)]
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: u16, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
        }
    }

    pub fn token_missing() -> Self {
        Self::new(codes::TOKEN_MISSING, StatusCode::UNAUTHORIZED, "token is missing")
    }

    pub fn token_invalid() -> Self {
        Self::new(codes::TOKEN_INVALID, StatusCode::UNAUTHORIZED, "token is invalid")
    }

    pub fn client_invalid() -> Self {
        Self::new(codes::CLIENT_INVALID, StatusCode::UNAUTHORIZED, "invalid client")
    }

    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, StatusCode::BAD_REQUEST, details)
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, StatusCode::INTERNAL_SERVER_ERROR, details)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<ConversationError> for ApiError {
    fn from(e: ConversationError) -> Self {
        let message = e.to_string();
        match e {
            ConversationError::Address(_) => {
                Self::new(codes::INVALID_ADDRESS, StatusCode::BAD_REQUEST, message)
            }
            ConversationError::UnauthorizedGroup { .. } => {
                Self::new(codes::FORBIDDEN_GROUP, StatusCode::FORBIDDEN, message)
            }
            ConversationError::InvalidQos { .. } => Self::invalid_request(message),
            ConversationError::NotFound { .. } | ConversationError::NoActiveEpoch { .. } => {
                Self::new(codes::NOT_FOUND, StatusCode::NOT_FOUND, message)
            }
            ref e if e.is_retryable() => {
                Self::new(codes::UNAVAILABLE, StatusCode::SERVICE_UNAVAILABLE, message)
            }
            _ => Self::internal(message),
        }
    }
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Why a bearer token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is not three dot-separated segments")]
    Malformed,

    #[error("segment is not valid base64url: {segment}")]
    Encoding { segment: &'static str },

    #[error("unsupported signing algorithm: {alg}")]
    UnsupportedAlgorithm { alg: String },

    #[error("signature does not match")]
    BadSignature,

    #[error("token expired at {expired_at}")]
    Expired { expired_at: u64 },

    #[error("required claim missing: {claim}")]
    MissingClaim { claim: &'static str },

    #[error("claim {claim} is invalid: {reason}")]
    InvalidClaim { claim: &'static str, reason: String },
}

impl From<TokenError> for ApiError {
    fn from(_: TokenError) -> Self {
        ApiError::token_invalid()
    }
}

/// Gateway-level errors (startup and serving)
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server bind error: {0}")]
    Bind(String),

    #[error("server error: {0}")]
    Serve(String),
}

//! API error types.
//!
//! Every error renders as `{"error": {"message": ..., "tag"?: ...}}`.
//! The 498 status is load-bearing: clients distinguish "refresh your
//! access token" (498) from "log in again" (401) by it alone.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

/// Custom status code for expired access tokens.
pub const STATUS_EXPIRED_ACCESS_TOKEN: u16 = 498;

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad credentials or credential-adjacent client mistakes; 401 without
    /// a tag, with a client-meaningful message.
    #[error("{0}")]
    Credentials(String),

    /// Missing, bogus or revoked bearer token.
    #[error("{0}")]
    InvalidAuth(String),

    #[error("The provided access token has expired.")]
    ExpiredAccessToken,

    #[error("The refresh token has expired.")]
    ExpiredRefreshToken,

    #[error("{0}")]
    InvalidParameters(String),

    /// 400 without a tag.
    #[error("{0}")]
    BadRequest(String),

    #[error("store error: {0}")]
    Store(#[from] satchel_store::StoreError),

    #[error("protocol error: {0}")]
    Core(#[from] satchel_core::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The canonical invalid-auth error.
    pub fn invalid_auth() -> Self {
        Self::InvalidAuth("Invalid login credentials.".to_string())
    }

    /// Get the tag for this error, if any.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::InvalidAuth(_) => Some("invalid-auth"),
            Self::ExpiredAccessToken => Some("expired-access-token"),
            Self::ExpiredRefreshToken => Some("expired-refresh-token"),
            Self::InvalidParameters(_) => Some("invalid-parameters"),
            _ => None,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Credentials(_) | Self::InvalidAuth(_) => StatusCode::UNAUTHORIZED,
            Self::ExpiredAccessToken => StatusCode::from_u16(STATUS_EXPIRED_ACCESS_TOKEN)
                .expect("498 is a valid status code"),
            Self::ExpiredRefreshToken | Self::InvalidParameters(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Store(_) | Self::Core(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Do not leak internals; log them under a correlation id the
            // client can quote back.
            let correlation_id = Uuid::new_v4();
            tracing::error!(correlation_id = %correlation_id, error = %self, "unexpected error");
            format!("Unexpected error (correlation id: {correlation_id})")
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorBody {
                tag: self.tag().map(str::to_string),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

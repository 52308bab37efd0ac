//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, error, warn};

use archipelago_core::{Error, ErrorKind};

/// Error returned by every handler.
///
/// The status code follows the error's kind. The body is always
/// `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError(Error::InvalidInput(msg.into()))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError(Error::Unauthorized(msg.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if !self.0.is_expected() {
            error!(error = %self.0, retryable = self.0.is_retryable(), "Request failed");
        } else if matches!(
            self.0.kind(),
            ErrorKind::Unauthorized | ErrorKind::InvalidInput
        ) {
            warn!(error = %self.0, "Request rejected");
        } else {
            debug!(error = %self.0, "Request refused");
        }

        // Store internals stay in the log.
        let message = match &self.0 {
            Error::Database(_) => "Storage unavailable".to_string(),
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

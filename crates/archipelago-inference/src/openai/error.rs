//! Mapping of chat API failures onto archipelago errors.

use archipelago_core::Error;

/// Error classes reported by OpenAI-compatible endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    AuthenticationError,
    RateLimitExceeded,
    ModelNotFound,
    ContextLengthExceeded,
    ServerError,
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) | (403, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }
}

/// Convert a chat API failure into an archipelago [`Error`].
///
/// Credential and model problems are configuration errors; everything else is
/// a failed request.
pub fn to_archipelago_error(code: OpenAIErrorCode, message: &str) -> Error {
    match code {
        OpenAIErrorCode::AuthenticationError => {
            Error::Config(format!("Suggester authentication failed: {}", message))
        }
        OpenAIErrorCode::ModelNotFound => {
            Error::Config(format!("Suggester model not found: {}", message))
        }
        OpenAIErrorCode::RateLimitExceeded => {
            Error::Request(format!("Suggester rate limit exceeded: {}", message))
        }
        OpenAIErrorCode::ContextLengthExceeded => {
            Error::InvalidInput(format!("Text too long for tag suggestion: {}", message))
        }
        OpenAIErrorCode::ServerError => {
            Error::Request(format!("Suggester server error: {}", message))
        }
        OpenAIErrorCode::Unknown => Error::Request(message.to_string()),
    }
}

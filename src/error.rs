//! Error types for vidgate.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Library-level error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid API key")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Download tool failed: {0}")]
    ToolInvocationFailed(String),

    #[error("Access to this video is restricted: {0}")]
    AccessBlocked(String),

    #[error("Downloaded file not found")]
    NoFileFound,

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("LLM API error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GatewayError {
    /// HTTP status used when this error reaches a caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_)
            | GatewayError::ToolInvocationFailed(_)
            | GatewayError::AccessBlocked(_)
            | GatewayError::NoFileFound => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to API callers.
    ///
    /// Access restrictions get a friendlier explanation than the raw tool
    /// diagnostic, and internal failures are not echoed verbatim.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::AccessBlocked(_) => {
                "This video requires sign-in or is otherwise restricted and cannot be downloaded."
                    .to_string()
            }
            GatewayError::Llm(_) => "Failed to generate response".to_string(),
            GatewayError::Io(_)
            | GatewayError::Json(_)
            | GatewayError::TomlParse(_)
            | GatewayError::Config(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        (
            status,
            Json(json!({ "success": false, "error": self.public_message() })),
        )
            .into_response()
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_failures_are_distinct() {
        let blocked = GatewayError::AccessBlocked("Sign in to confirm you're not a bot".into());
        let failed = GatewayError::ToolInvocationFailed("exit status 1".into());
        let missing = GatewayError::NoFileFound;

        assert_ne!(blocked.public_message(), failed.public_message());
        assert_ne!(failed.public_message(), missing.public_message());
        assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = GatewayError::Config("missing bucket".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal Server Error");
    }
}

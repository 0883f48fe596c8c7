use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Staging error: {0}")]
    Staging(String),

    #[error("{0}")]
    Downstream(String),

    #[error("Cleanup error: {0}")]
    Cleanup(String),
}

/// Failure classification carried by an `UploadOutcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    ConfigurationError,
    SignerError,
    StagingError,
    DownstreamError,
    CleanupError,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorKind::SignerError => "SIGNER_ERROR",
            ErrorKind::StagingError => "STAGING_ERROR",
            ErrorKind::DownstreamError => "DOWNSTREAM_ERROR",
            ErrorKind::CleanupError => "CLEANUP_ERROR",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::ValidationError,
            AppError::Configuration(_) => ErrorKind::ConfigurationError,
            AppError::Signer(_) => ErrorKind::SignerError,
            AppError::Staging(_) => ErrorKind::StagingError,
            AppError::Downstream(_) => ErrorKind::DownstreamError,
            AppError::Cleanup(_) => ErrorKind::CleanupError,
        }
    }

    /// Message without the variant prefix, as shown to callers.
    pub fn message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::Configuration(msg)
            | AppError::Signer(msg)
            | AppError::Staging(msg)
            | AppError::Downstream(msg)
            | AppError::Cleanup(msg) => msg.clone(),
        }
    }
}

/// Renders the failure half of the external contract.
pub fn failure_response(kind: ErrorKind, message: &str) -> Response {
    let body = match kind {
        // Validation failures carry the message in `error` directly.
        ErrorKind::ValidationError => json!({
            "success": false,
            "error": message,
        }),
        _ => json!({
            "success": false,
            "error": kind.code(),
            "message": message,
        }),
    };

    (kind.status(), Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        match &self {
            AppError::Validation(_) => {}
            other => tracing::error!("Request failed: {}", other),
        }
        failure_response(kind, &self.message())
    }
}

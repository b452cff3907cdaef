use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Error body returned by every handler on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Scanned barcode does not satisfy the verification rule for the
    /// current slot. Session state is unchanged.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Barcode already recorded in this session. Session state is unchanged.
    #[error("Duplicate scan: {0}")]
    DuplicateScan(String),

    /// Session not started or verification-code lookup still pending;
    /// scanning is disabled until resolved.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Assembly type could not be resolved. Never surfaced to the operator:
    /// the registry's fallback synthesis always recovers.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Durable store unreachable. Non-fatal; the session continues on the
    /// local cache and the failure is logged for reconciliation.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Completion record failed to submit remotely. The local completion
    /// stands; reconciliation is manual.
    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Event error: {0}")]
    Event(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DuplicateScan(_) | Self::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Connectivity(_) | Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::Completion(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Configuration(_)
            | Self::Cache(_)
            | Self::Serialization(_)
            | Self::Event(_)
            | Self::Internal(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::Cache(_) | Self::Serialization(_) | Self::Event(_) | Self::Internal(_)
            | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ServiceError::Connectivity(err.to_string())
        } else {
            ServiceError::ExternalService(err.to_string())
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message: self.response_message(),
            timestamp: Utc::now().to_rfc3339(),
        });
        (status, body).into_response()
    }
}

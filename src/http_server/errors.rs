//! # HTTP API Errors
//!
//! Maps ledger failures onto status codes and a uniform JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use crate::error::LedgerError;

/// Result type for HTTP handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP API errors
#[derive(Debug, Error)]
pub enum ApiError {
    // ==================
    // Client Errors (400)
    // ==================
    /// Body is not JSON
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Unparseable query parameter
    #[error("Invalid query parameter: {0}")]
    InvalidQueryParam(String),

    /// Missing required parameter
    #[error("Missing required parameter: {0}")]
    MissingParam(&'static str),

    /// Limit exceeds maximum
    #[error("Limit {0} exceeds maximum {1}")]
    LimitExceeded(usize, usize),

    // ==================
    // Ledger Errors (404/409/422/500)
    // ==================
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    // ==================
    // Server Errors (500)
    // ==================
    /// Handler task failed outside the ledger
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody(_)
            | ApiError::InvalidQueryParam(_)
            | ApiError::MissingParam(_)
            | ApiError::LimitExceeded(_, _) => StatusCode::BAD_REQUEST,

            ApiError::Ledger(err) => match err {
                LedgerError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                LedgerError::Conflict { .. } => StatusCode::CONFLICT,
                LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
                LedgerError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },

            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Ledger(err) => err.code(),
            ApiError::Internal(_) => "INTERNAL_ERROR",
            _ => "BAD_REQUEST",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ApiError::Ledger(LedgerError::Validation { source, .. }) => {
                Some(json!({ "violations": source.violations() }))
            }
            ApiError::Ledger(err) => err.episode_id().map(|id| json!({ "id": id })),
            _ => None,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        let operation = match err {
            ApiError::Ledger(e) => Some(e.operation().as_str()),
            _ => None,
        };
        Self {
            error: err.to_string(),
            code: err.code(),
            operation,
            details: err.details(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = Json(ErrorResponse::from(&self));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;
    use crate::model::EpisodeId;
    use crate::schema::{FieldViolation, ValidationError};

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::InvalidQueryParam("limit".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LedgerError::not_found(Operation::Get, EpisodeId::new("x"))).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LedgerError::conflict(Operation::Ingest, EpisodeId::new("x"))).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal("join".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_body_lists_violations() {
        let err = ApiError::from(LedgerError::validation(
            Operation::Ingest,
            ValidationError::single(FieldViolation::missing_field("status")),
        ));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["operation"], "ingest");
        assert_eq!(body["details"]["violations"][0]["field"], "status");
    }
}

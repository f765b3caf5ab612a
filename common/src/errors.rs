//! Application error types.
//!
//! Probe failures are grouped into three kinds: the database could not be
//! reached, a literal query came back wrong, or a query against the probed
//! table failed. Every variant carries the underlying message verbatim.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by probe operations and the HTTP layer.
#[derive(Debug, Error)]
pub enum AppError {
    /// The connection source could not hand out a live connection.
    #[error("Database connection failed: {0}")]
    DatabaseConnection(String),

    /// A literal query returned the wrong cardinality or value, or failed outright.
    #[error("Query check failed: {0}")]
    DatabaseQuery(String),

    /// A query against the probed table failed (missing table, denied access, ...).
    #[error("Schema check failed: {0}")]
    Schema(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported database type: {0}")]
    UnsupportedDatabaseType(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DatabaseConnection(_) => "CONNECTION_ERROR",
            AppError::DatabaseQuery(_) => "QUERY_ERROR",
            AppError::Schema(_) => "SCHEMA_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::UnsupportedDatabaseType(_) => "UNSUPPORTED_DATABASE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status used when the error is returned from a handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseConnection(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) | AppError::UnsupportedDatabaseType(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::DatabaseQuery(_)
            | AppError::Schema(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_kinds_have_distinct_codes() {
        let codes = [
            AppError::DatabaseConnection("x".into()).code(),
            AppError::DatabaseQuery("x".into()).code(),
            AppError::Schema("x".into()).code(),
        ];
        assert_eq!(codes, ["CONNECTION_ERROR", "QUERY_ERROR", "SCHEMA_ERROR"]);
    }

    #[test]
    fn test_message_is_kept_verbatim() {
        let err = AppError::Schema("no such table: demo".into());
        assert!(err.to_string().contains("no such table: demo"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::DatabaseConnection("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Schema("gone".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_response_uses_status() {
        let response = AppError::Validation("limit out of range".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

//! API error responses.
//!
//! Every error body carries the request id so a page error can be matched to
//! the server log line.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dpusage_core::config::warehouse_hint;
use dpusage_core::UsageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request ID for tracking requests through the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Structured JSON error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub request_id: String,
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String, request_id: String },

    #[error("Not found: {message}")]
    NotFound { message: String, request_id: String },

    /// The warehouse rejected or failed the query
    #[error("Warehouse error: {message}")]
    Warehouse { message: String, request_id: String },

    #[error("Internal server error: {message}")]
    Internal { message: String, request_id: String },
}

impl ApiError {
    pub fn not_found(message: impl Into<String>, request_id: &RequestId) -> Self {
        ApiError::NotFound {
            message: message.into(),
            request_id: request_id.0.clone(),
        }
    }

    pub fn internal(message: impl Into<String>, request_id: &RequestId) -> Self {
        ApiError::Internal {
            message: message.into(),
            request_id: request_id.0.clone(),
        }
    }

    /// Classify a usage error: bad input is the caller's fault, warehouse
    /// failures are upstream failures
    pub fn from_usage(err: UsageError, request_id: &RequestId) -> Self {
        let request_id = request_id.0.clone();
        let message = err.to_string();
        match err {
            UsageError::Warehouse(_) => ApiError::Warehouse {
                message,
                request_id,
            },
            UsageError::InvalidWindow(_)
            | UsageError::InvalidSchema(_)
            | UsageError::InvalidObjectName(_)
            | UsageError::ValidationError(_) => ApiError::BadRequest {
                message,
                request_id,
            },
            UsageError::Other(_) => ApiError::Internal {
                message,
                request_id,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Warehouse { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            ApiError::BadRequest { request_id, .. }
            | ApiError::NotFound { request_id, .. }
            | ApiError::Warehouse { request_id, .. }
            | ApiError::Internal { request_id, .. } => request_id,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest {
                message,
                request_id,
            } => {
                tracing::warn!(request_id = %request_id, error = %message, "Bad request");
                ErrorResponse {
                    error: message,
                    details: None,
                    request_id,
                }
            }
            ApiError::NotFound {
                message,
                request_id,
            } => ErrorResponse {
                error: message,
                details: None,
                request_id,
            },
            ApiError::Warehouse {
                message,
                request_id,
            } => {
                tracing::error!(request_id = %request_id, error = %message, "Warehouse query failed");
                ErrorResponse {
                    error: format!("Error connecting to or querying the warehouse: {}", message),
                    details: Some(warehouse_hint()),
                    request_id,
                }
            }
            ApiError::Internal {
                message,
                request_id,
            } => {
                // Internal details stay in the log
                tracing::error!(request_id = %request_id, error = %message, "Internal error");
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    details: None,
                    request_id,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid() -> RequestId {
        RequestId("req-1".to_string())
    }

    #[test]
    fn test_usage_error_classification() {
        let bad = ApiError::from_usage(UsageError::InvalidWindow("0".to_string()), &rid());
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let warehouse = ApiError::from_usage(
            UsageError::Warehouse(rusqlite::Error::QueryReturnedNoRows),
            &rid(),
        );
        assert_eq!(warehouse.status(), StatusCode::BAD_GATEWAY);

        let other = ApiError::from_usage(UsageError::Other("boom".to_string()), &rid());
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(other.request_id(), "req-1");
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}

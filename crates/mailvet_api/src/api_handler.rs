//! Shared API types: request/response envelopes and error mapping.
//!
//! The engine itself never fails a request; the errors here cover the
//! transport layer only (missing fields, oversize batches, malformed
//! options).

use axum::{http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};

/// Request body for single validation
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    /// Address to validate; its absence is a 400, not a deserialize error
    pub email: Option<String>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

/// Request body for bulk validation
#[derive(Debug, Deserialize)]
pub struct BulkValidateRequest {
    pub emails: Option<Vec<String>>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

/// Success envelope wrapping every validation response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    /// ISO-8601 timestamp of the response
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Machine-readable error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// Result type for API handlers
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Transport-level errors with stable machine codes.
#[derive(Debug)]
pub enum ApiError {
    MissingEmail,
    MissingEmails,
    TooManyEmails(usize),
    InvalidOptions(String),
    /// The engine folds its failures into results, so this only covers
    /// future transport-level faults.
    #[allow(dead_code)]
    Internal(String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            ApiError::MissingEmail => (
                StatusCode::BAD_REQUEST,
                "MISSING_EMAIL",
                "Email address is required".to_string(),
            ),
            ApiError::MissingEmails => (
                StatusCode::BAD_REQUEST,
                "MISSING_EMAILS",
                "A non-empty list of email addresses is required".to_string(),
            ),
            ApiError::TooManyEmails(limit) => (
                StatusCode::BAD_REQUEST,
                "TOO_MANY_EMAILS",
                format!("Maximum {limit} emails allowed per bulk request"),
            ),
            ApiError::InvalidOptions(detail) => (
                StatusCode::BAD_REQUEST,
                "INVALID_OPTIONS",
                format!("Unrecognized validation options: {detail}"),
            ),
            ApiError::Internal(detail) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", detail)
            }
        };

        let body = ErrorBody {
            error: message,
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Parse the raw `options` value from a request body, falling back to
/// defaults when absent.
pub fn parse_options(
    raw: Option<&serde_json::Value>,
) -> Result<mailvet_core::ValidationOptions, ApiError> {
    match raw {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|err| ApiError::InvalidOptions(err.to_string())),
        None => Ok(mailvet_core::ValidationOptions::default()),
    }
}

/// Whether the request explicitly set `checkSMTP`. Bulk validation skips
/// SMTP probing unless the caller asked for it by name.
pub fn smtp_explicitly_requested(raw: Option<&serde_json::Value>) -> bool {
    raw.and_then(|value| value.get("checkSMTP")).is_some()
}

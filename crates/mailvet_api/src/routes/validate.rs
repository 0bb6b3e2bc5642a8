//! Single-address validation endpoint.

use std::sync::Arc;

use axum::{extract::State, response::Json};
use mailvet_core::ValidationResult;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api_handler::{parse_options, ApiError, ApiResponse, ApiResult, ValidateRequest};
use crate::AppState;

/// POST /v1/validate
///
/// Runs the full validation pipeline for one address and returns the
/// result wrapped in the standard envelope. A missing or empty `email`
/// field is a 400 with code `MISSING_EMAIL`.
#[instrument(skip(state, request), fields(request_id))]
pub async fn validate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<ValidationResult> {
    let request_id = Uuid::new_v4().to_string();
    tracing::Span::current().record("request_id", request_id.as_str());

    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or(ApiError::MissingEmail)?;

    let options = parse_options(request.options.as_ref())?;

    let result = state.validator.validate(email, &options).await;

    info!(
        status = ?result.status,
        score = result.score,
        elapsed_ms = result.validation_time_ms,
        "validation served"
    );

    Ok(Json(ApiResponse::new(result)))
}

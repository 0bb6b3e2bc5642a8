//! Bulk validation endpoint.

use std::sync::Arc;

use axum::{extract::State, response::Json};
use mailvet_core::BulkReport;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api_handler::{
    parse_options, smtp_explicitly_requested, ApiError, ApiResponse, ApiResult,
    BulkValidateRequest,
};
use crate::AppState;

/// POST /v1/validate/bulk
///
/// Validates a batch of addresses with de-duplication, caching and bounded
/// concurrency. The input size cap is enforced here, not in the engine.
/// SMTP probing is skipped unless the request names `checkSMTP` explicitly:
/// probing every address in a large batch multiplies remote connections.
#[instrument(skip(state, request), fields(request_id, batch_size))]
pub async fn bulk_validate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkValidateRequest>,
) -> ApiResult<BulkReport> {
    let request_id = Uuid::new_v4().to_string();
    tracing::Span::current().record("request_id", request_id.as_str());

    let emails = request
        .emails
        .as_deref()
        .filter(|emails| !emails.is_empty())
        .ok_or(ApiError::MissingEmails)?;

    let limit = state.config.security.max_bulk_emails;
    if emails.len() > limit {
        return Err(ApiError::TooManyEmails(limit));
    }
    tracing::Span::current().record("batch_size", emails.len());

    let mut options = parse_options(request.options.as_ref())?;
    if !smtp_explicitly_requested(request.options.as_ref()) {
        options.check_smtp = false;
    }

    let report = state.bulk.validate_batch(emails, &options).await;

    info!(
        total = report.total,
        processed = report.processed,
        duplicates_removed = report.duplicates_removed,
        elapsed_ms = report.validation_time_ms,
        "bulk validation served"
    );

    Ok(Json(ApiResponse::new(report)))
}

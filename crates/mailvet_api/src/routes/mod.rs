//! API routes:
//! - `validate`: single-address validation
//! - `bulk`: batch validation
//! - `health`: health checks and monitoring endpoints

pub mod bulk;
pub mod health;
pub mod validate;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

/// Build all API routes with the shared application state applied.
pub fn build_routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Validation endpoints
        .route("/v1/validate", post(validate::validate_handler))
        .route("/v1/validate/bulk", post(bulk::bulk_validate_handler))
        // Health and monitoring endpoints
        .route("/health", get(health::health_handler))
        .route("/ready", get(health::ready_handler))
        .route("/metrics", get(health::metrics_handler))
        // Administrative endpoints
        .route("/admin/stats", get(health::stats_handler))
        .route("/admin/cache/clear", post(health::clear_cache_handler))
        .with_state(state)
}

//! Health check and monitoring routes.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json};
use mailvet_core::ValidationOptions;
use serde::Serialize;
use tracing::info;

use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// GET /health
///
/// Liveness check: returns 200 with build information.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: String,
}

/// GET /ready
///
/// Runs a network-free validation through the pipeline to confirm the
/// engine is wired up.
pub async fn ready_handler(State(state): State<Arc<AppState>>) -> Json<ReadinessResponse> {
    let probe_options = ValidationOptions {
        check_domain: false,
        check_mx: false,
        check_smtp: false,
        ..ValidationOptions::default()
    };
    let result = state
        .validator
        .validate("readiness@example.com", &probe_options)
        .await;

    Json(ReadinessResponse {
        ready: result.syntax_valid,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /metrics
///
/// Prometheus-compatible text metrics about the engine's corpora and caches.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    let stats = state.validator.stats();

    let metrics = format!(
        "# HELP mailvet_disposable_domains_total Domains loaded into the disposable blocklist\n\
         # TYPE mailvet_disposable_domains_total gauge\n\
         mailvet_disposable_domains_total {}\n\
         \n\
         # HELP mailvet_typo_providers_total Provider domains in the typo whitelist\n\
         # TYPE mailvet_typo_providers_total gauge\n\
         mailvet_typo_providers_total {}\n\
         \n\
         # HELP mailvet_cache_entries_total Entries across all TTL cache namespaces\n\
         # TYPE mailvet_cache_entries_total gauge\n\
         mailvet_cache_entries_total {}\n\
         \n\
         # HELP mailvet_build_info Build information\n\
         # TYPE mailvet_build_info gauge\n\
         mailvet_build_info{{version=\"{}\"}} 1\n",
        stats.disposable_domains_loaded + stats.disposable_fallback_domains,
        stats.typo_providers,
        stats.cache_entries,
        env!("CARGO_PKG_VERSION")
    );

    (StatusCode::OK, metrics)
}

/// Statistics response
#[derive(Serialize)]
pub struct StatsResponse {
    pub version: String,
    pub engine: mailvet_core::EngineStats,
    pub timestamp: String,
}

/// GET /admin/stats
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.validator.stats(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Cache response
#[derive(Serialize)]
pub struct CacheResponse {
    pub message: String,
    pub timestamp: String,
}

/// POST /admin/cache/clear
///
/// Drops every TTL cache namespace and the resolver's record cache.
pub async fn clear_cache_handler(State(state): State<Arc<AppState>>) -> Json<CacheResponse> {
    state.validator.clear_caches();

    info!("caches cleared by admin request");

    Json(CacheResponse {
        message: "Validation caches cleared successfully".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

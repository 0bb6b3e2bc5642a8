//! mailvet API server.
//!
//! Thin axum surface over the validation engine: single and bulk
//! validation endpoints plus health/monitoring routes.

use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use mailvet_core::{BulkValidator, EmailValidator};
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api_handler;
mod config;
mod routes;

use config::AppConfig;

/// Shared application state
pub struct AppState {
    pub validator: Arc<EmailValidator>,
    pub bulk: BulkValidator,
    pub config: Arc<AppConfig>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    init_tracing(&config)?;

    info!("starting mailvet API v{}", env!("CARGO_PKG_VERSION"));

    let validator = Arc::new(
        EmailValidator::new(config.engine.to_engine_config())
            .map_err(|err| format!("failed to initialize validation engine: {err}"))?,
    );
    let stats = validator.stats();
    info!(
        disposable_domains = stats.disposable_domains_loaded,
        fallback_domains = stats.disposable_fallback_domains,
        typo_providers = stats.typo_providers,
        "engine initialized"
    );

    let state = AppState {
        bulk: BulkValidator::new(Arc::clone(&validator)),
        validator,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("listening on {addr}");
    info!("validation endpoint: POST http://{addr}/v1/validate");
    info!("bulk endpoint:       POST http://{addr}/v1/validate/bulk");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down gracefully");
    Ok(())
}

/// Build the router with tracing, CORS and compression layers applied.
fn create_router(state: AppState, config: &AppConfig) -> Router {
    let mut router = routes::build_routes(Arc::new(state));

    router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    if config.security.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(tower_http::cors::Any),
        );
    }

    router.layer(CompressionLayer::new())
}

/// Layered configuration: defaults, then Config.toml, then MAILVET_ env.
fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if std::path::Path::new("Config.toml").exists() {
        figment = figment.merge(Toml::file("Config.toml"));
    }

    figment = figment.merge(Env::prefixed("MAILVET_").split("_"));

    let config: AppConfig = figment.extract()?;
    Ok(config)
}

fn init_tracing(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.observability.log_level.clone().into());

    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}

/// Graceful shutdown on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("received SIGTERM, starting graceful shutdown");
        },
    }
}

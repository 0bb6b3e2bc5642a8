//! Configuration management for the validation API.
//!
//! Configuration is layered with figment: struct defaults, then an
//! optional `Config.toml`, then `MAILVET_`-prefixed environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineSettings,
    pub observability: ObservabilityConfig,
    pub security: SecurityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    pub port: u16,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

/// Validation engine settings, mapped onto `mailvet_core::EngineConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub dns_timeout_ms: u64,
    pub dns_attempts: usize,
    /// Blocklist path; a missing file falls back to the built-in set
    pub disposable_list_path: Option<PathBuf>,
    pub bloom_filter_fp_rate: f64,
    /// Domain presented in HELO / MAIL FROM during SMTP probes
    pub smtp_from_domain: String,
    pub smtp_timeout_ms: u64,
    pub bulk_concurrency: usize,
    pub bulk_chunk_delay_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let defaults = mailvet_core::EngineConfig::default();
        Self {
            dns_timeout_ms: defaults.dns_timeout_ms,
            dns_attempts: defaults.dns_attempts,
            disposable_list_path: defaults.disposable_list_path,
            bloom_filter_fp_rate: defaults.bloom_filter_fp_rate,
            smtp_from_domain: defaults.smtp_from_domain,
            smtp_timeout_ms: defaults.smtp_timeout_ms,
            bulk_concurrency: defaults.bulk_concurrency,
            bulk_chunk_delay_ms: defaults.bulk_chunk_delay_ms,
        }
    }
}

impl EngineSettings {
    pub fn to_engine_config(&self) -> mailvet_core::EngineConfig {
        mailvet_core::EngineConfig {
            dns_timeout_ms: self.dns_timeout_ms,
            dns_attempts: self.dns_attempts,
            disposable_list_path: self.disposable_list_path.clone(),
            bloom_filter_fp_rate: self.bloom_filter_fp_rate,
            smtp_from_domain: self.smtp_from_domain.clone(),
            smtp_timeout_ms: self.smtp_timeout_ms,
            bulk_concurrency: self.bulk_concurrency,
            bulk_chunk_delay_ms: self.bulk_chunk_delay_ms,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Emit JSON-structured logs (production) instead of human-readable
    pub json_logs: bool,
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            log_level: "info".to_string(),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Upper bound on addresses per bulk request
    pub max_bulk_emails: usize,
    /// Maximum request body size in bytes
    pub max_body_size_bytes: usize,
    pub enable_cors: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_bulk_emails: 1_000,
            max_body_size_bytes: 256 * 1024,
            enable_cors: true,
        }
    }
}

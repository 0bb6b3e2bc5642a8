//! # mailvet_core
//!
//! Email validation engine producing a structured verdict (valid / risky /
//! invalid) with a 0-100 confidence score and a breakdown of contributing
//! factors.
//!
//! ## Features
//!
//! - **RFC 5321/5322 syntax validation** with IDN/punycode support
//! - **DNS resolution** (A/AAAA + MX) with TTL-bounded caching via hickory-resolver
//! - **SMTP envelope probing** for recipient acceptance and catch-all detection
//! - **Disposable domain detection** backed by a Bloom filter and pattern rules
//! - **Typo correction** using Levenshtein distance against major providers
//! - **SPF/DMARC health probing** and heuristic reputation scoring
//! - **Bulk scheduling** with de-duplication and bounded concurrency
//!
//! ## Example
//!
//! ```rust,no_run
//! use mailvet_core::{EmailValidator, EngineConfig, ValidationOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let validator = EmailValidator::new(EngineConfig::default())?;
//!
//!     let result = validator
//!         .validate("john.doe@gmail.com", &ValidationOptions::default())
//!         .await;
//!     println!("status: {:?}, score: {}", result.status, result.score);
//!
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod cache;
pub mod disposable;
pub mod dns;
pub mod health;
pub mod pipeline;
pub mod score;
pub mod smtp;
pub mod syntax;
pub mod typo;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the validation engine, fixed at construction time.
///
/// Per-request behavior (which checks run, strict mode, timeouts) lives in
/// [`ValidationOptions`]; this struct holds everything that is decided once
/// when the engine starts.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// DNS resolver timeout in milliseconds
    pub dns_timeout_ms: u64,
    /// Maximum number of DNS lookup attempts
    pub dns_attempts: usize,
    /// Path to a line-delimited disposable-domain blocklist. Absence of the
    /// file is non-fatal; the built-in fallback set is used instead.
    pub disposable_list_path: Option<PathBuf>,
    /// Bloom filter false positive rate for the disposable blocklist
    pub bloom_filter_fp_rate: f64,
    /// Domain presented in HELO and MAIL FROM when probing remote servers
    pub smtp_from_domain: String,
    /// Default whole-dialogue SMTP deadline in milliseconds
    pub smtp_timeout_ms: u64,
    /// Maximum in-flight validations during bulk processing
    pub bulk_concurrency: usize,
    /// Pause between bulk chunks in milliseconds
    pub bulk_chunk_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dns_timeout_ms: 2_000,
            dns_attempts: 2,
            disposable_list_path: Some(PathBuf::from("data/disposable_domains.txt")),
            bloom_filter_fp_rate: 0.0001, // 0.01%
            smtp_from_domain: "mailvet.local".to_string(),
            smtp_timeout_ms: 5_000,
            bulk_concurrency: 10,
            bulk_chunk_delay_ms: 100,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_smtp_timeout() -> u64 {
    5_000
}

fn default_batch_size() -> usize {
    10
}

/// Per-request validation options.
///
/// Field names follow the wire contract (camelCase); every field is optional
/// on the wire and falls back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationOptions {
    #[serde(default = "default_true")]
    pub check_syntax: bool,
    #[serde(default = "default_true")]
    pub check_domain: bool,
    #[serde(default = "default_true", rename = "checkMX")]
    pub check_mx: bool,
    #[serde(default = "default_true", rename = "checkSMTP")]
    pub check_smtp: bool,
    #[serde(default = "default_true")]
    pub check_disposable: bool,
    #[serde(default = "default_true")]
    pub check_typos: bool,
    #[serde(alias = "useStrictMode")]
    pub strict_mode: bool,
    #[serde(default = "default_true")]
    pub allow_international: bool,
    /// Whole-dialogue SMTP deadline in milliseconds
    #[serde(default = "default_smtp_timeout", rename = "smtpTimeout")]
    pub smtp_timeout_ms: u64,
    /// Overrides the engine-wide HELO / MAIL FROM domain
    pub smtp_from_domain: Option<String>,
    #[serde(default = "default_true")]
    pub enable_cache: bool,
    /// Chunk size for the bulk scheduler
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Case-insensitive de-duplication of bulk input
    #[serde(default = "default_true")]
    pub deduplicate: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_syntax: true,
            check_domain: true,
            check_mx: true,
            check_smtp: true,
            check_disposable: true,
            check_typos: true,
            strict_mode: false,
            allow_international: true,
            smtp_timeout_ms: default_smtp_timeout(),
            smtp_from_domain: None,
            enable_cache: true,
            batch_size: default_batch_size(),
            deduplicate: true,
        }
    }
}

/// Outcome of the SMTP recipient probe.
///
/// `Unknown` is a first-class value: the dialogue completed without a
/// definitive accept (250) or reject (550) on the target recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpDeliverability {
    Yes,
    No,
    Unknown,
}

impl SmtpDeliverability {
    pub fn is_yes(self) -> bool {
        matches!(self, SmtpDeliverability::Yes)
    }
}

/// Final classification of a validated address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Risky,
    Invalid,
    Error,
}

/// Per-stage contribution breakdown included in every result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFactors {
    pub format: bool,
    pub domain: bool,
    pub mx: bool,
    pub smtp: bool,
    /// Address reputation in [0, 100]
    pub reputation: u8,
    /// MX deliverability score in [0, 100]
    pub deliverability: u8,
}

/// Domain-level authentication and reputation snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainHealth {
    pub spf: bool,
    /// Always `false`: DKIM selectors are not discoverable without prior
    /// knowledge, so the record is never probed. Kept as a scoring input.
    pub dkim: bool,
    pub dmarc: bool,
    pub blacklisted: bool,
    /// Domain reputation in [0, 100]
    pub reputation: u8,
}

/// Complete validation result for one address.
///
/// This is the engine's only output type: every failure mode (parser
/// rejection, DNS failure, SMTP error) is folded into these fields rather
/// than surfaced as an error to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// The input string, echoed back unchanged
    pub email: String,
    pub syntax_valid: bool,
    pub domain_valid: bool,
    pub mx_found: bool,
    pub disposable: bool,
    pub typo_detected: bool,
    pub smtp_deliverable: SmtpDeliverability,
    /// Suggested corrected address when a typo was detected
    pub suggestion: Option<String>,
    /// Lowercased local part @ punycode-ASCII domain
    pub normalized_email: Option<String>,
    /// Canonical Gmail form (dots and +tag stripped) for Gmail-family domains
    pub gmail_normalized: Option<String>,
    pub is_role_based: bool,
    pub has_plus_alias: bool,
    pub is_catch_all: bool,
    pub is_international: bool,
    pub is_free_provider: bool,
    pub factors: CheckFactors,
    pub domain_health: Option<DomainHealth>,
    pub smtp_server_banner: Option<String>,
    pub smtp_server_response: Option<String>,
    pub tls_supported: bool,
    /// Confidence score in [0, 100]
    pub score: u8,
    pub status: ValidationStatus,
    /// Human-readable explanation of the verdict
    pub reason: String,
    /// Stage names in execution order
    pub checks_performed: Vec<String>,
    pub validation_time_ms: u64,
}

impl ValidationResult {
    /// Empty result for `email` before any stage has run.
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            syntax_valid: false,
            domain_valid: false,
            mx_found: false,
            disposable: false,
            typo_detected: false,
            smtp_deliverable: SmtpDeliverability::No,
            suggestion: None,
            normalized_email: None,
            gmail_normalized: None,
            is_role_based: false,
            has_plus_alias: false,
            is_catch_all: false,
            is_international: false,
            is_free_provider: false,
            factors: CheckFactors::default(),
            domain_health: None,
            smtp_server_banner: None,
            smtp_server_response: None,
            tls_supported: false,
            score: 0,
            status: ValidationStatus::Invalid,
            reason: String::new(),
            checks_performed: Vec::new(),
            validation_time_ms: 0,
        }
    }
}

/// Errors that can occur while constructing or configuring the engine.
///
/// Validation itself never returns these; see [`ValidationResult`].
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("DNS resolver initialization failed: {0}")]
    Dns(#[from] hickory_resolver::error::ResolveError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ValidationError>;

// Re-export main types
pub use bulk::{BulkReport, BulkSummary, BulkValidator};
pub use pipeline::{EmailValidator, EngineStats};

//! DNS resolution for domain existence, MX discovery and TXT lookups,
//! built on hickory-resolver.
//!
//! Lookup failures never escape as errors: a domain that does not resolve
//! produces a negative [`DomainResolution`], and a failed MX query falls
//! back to the implicit-MX rule of RFC 5321 §5.1 before reporting absence.

use std::time::Duration;

use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    AsyncResolver, TokioAsyncResolver,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Result;

/// MX exchanges operated by providers with reliable delivery infrastructure.
const WELL_KNOWN_PROVIDERS: &[&str] = &[
    "google.com",
    "outlook.com",
    "microsoft.com",
    "amazon.com",
];

/// Deliverability score assigned when a domain has no MX records but
/// accepts mail through its A record (implicit MX).
const IMPLICIT_MX_SCORE: u8 = 60;

/// Outcome of an A/AAAA existence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainResolution {
    pub valid: bool,
    pub reason: Option<String>,
}

/// A single MX record, priority-ordered within [`MxResolution`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxHost {
    pub priority: u16,
    pub exchange: String,
}

/// Outcome of an MX lookup, including the implicit-MX fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxResolution {
    pub found: bool,
    /// Sorted ascending by priority; empty when delivery relies on the
    /// implicit MX fallback.
    pub records: Vec<MxHost>,
    /// Deliverability estimate in [0, 100]
    pub deliverability_score: u8,
    pub reason: Option<String>,
}

/// Async resolver wrapper shared by the pipeline and the health probe.
pub struct DomainResolver {
    resolver: TokioAsyncResolver,
}

impl DomainResolver {
    /// Create a resolver with tuned options.
    ///
    /// # Arguments
    /// * `timeout_ms` - per-query timeout in milliseconds
    /// * `attempts` - maximum retry attempts per query
    pub fn new(timeout_ms: u64, attempts: usize) -> Result<Self> {
        info!("initializing DNS resolver with Cloudflare upstream");

        let config = ResolverConfig::cloudflare();

        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_millis(timeout_ms);
        opts.attempts = attempts;
        opts.positive_min_ttl = Some(Duration::from_secs(60));
        opts.negative_min_ttl = Some(Duration::from_secs(30));
        opts.positive_max_ttl = Some(Duration::from_secs(3600));

        let resolver = AsyncResolver::tokio(config, opts);

        Ok(Self { resolver })
    }

    /// Whether `domain` exists: any A or AAAA record resolves.
    pub async fn resolve_domain(&self, domain: &str) -> DomainResolution {
        let ascii = match to_ascii(domain) {
            Ok(ascii) => ascii,
            Err(reason) => {
                return DomainResolution {
                    valid: false,
                    reason: Some(reason),
                }
            }
        };

        match self.resolver.lookup_ip(ascii.as_str()).await {
            Ok(lookup) => {
                let found = lookup.iter().next().is_some();
                debug!(domain = %ascii, found, "A/AAAA lookup");
                DomainResolution {
                    valid: found,
                    reason: (!found).then(|| "domain has no A or AAAA records".to_string()),
                }
            }
            Err(err) => {
                debug!(domain = %ascii, %err, "A/AAAA lookup failed");
                DomainResolution {
                    valid: false,
                    reason: Some(format!("domain does not resolve: {err}")),
                }
            }
        }
    }

    /// MX discovery with the implicit-MX fallback.
    pub async fn resolve_mx(&self, domain: &str) -> MxResolution {
        let ascii = match to_ascii(domain) {
            Ok(ascii) => ascii,
            Err(reason) => {
                return MxResolution {
                    found: false,
                    records: Vec::new(),
                    deliverability_score: 0,
                    reason: Some(reason),
                }
            }
        };

        let mut records = match self.resolver.mx_lookup(ascii.as_str()).await {
            Ok(lookup) => lookup
                .iter()
                .map(|mx| MxHost {
                    priority: mx.preference(),
                    exchange: normalize_exchange(&mx.exchange().to_utf8()),
                })
                .collect::<Vec<_>>(),
            Err(err) => {
                debug!(domain = %ascii, %err, "MX lookup failed");
                Vec::new()
            }
        };

        if !records.is_empty() {
            records.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.exchange.cmp(&b.exchange)));
            records.dedup();
            let score = mx_deliverability_score(&records);
            debug!(domain = %ascii, count = records.len(), score, "MX records found");
            return MxResolution {
                found: true,
                records,
                deliverability_score: score,
                reason: None,
            };
        }

        // RFC 5321 §5.1: a domain with no MX but an A record is treated as
        // its own mail exchanger.
        match self.resolver.lookup_ip(ascii.as_str()).await {
            Ok(lookup) if lookup.iter().next().is_some() => {
                debug!(domain = %ascii, "no MX records, falling back to implicit MX");
                MxResolution {
                    found: true,
                    records: Vec::new(),
                    deliverability_score: IMPLICIT_MX_SCORE,
                    reason: Some("no MX records; using implicit MX via A record".to_string()),
                }
            }
            Ok(_) => MxResolution {
                found: false,
                records: Vec::new(),
                deliverability_score: 0,
                reason: Some("domain has no MX or A records".to_string()),
            },
            Err(err) => {
                warn!(domain = %ascii, %err, "implicit MX fallback lookup failed");
                MxResolution {
                    found: false,
                    records: Vec::new(),
                    deliverability_score: 0,
                    reason: Some("domain has no MX or A records".to_string()),
                }
            }
        }
    }

    /// TXT records for `name`; lookup failures read as "no records".
    pub async fn txt_records(&self, name: &str) -> Vec<String> {
        match self.resolver.txt_lookup(name).await {
            Ok(lookup) => {
                let records: Vec<String> = lookup
                    .iter()
                    .map(|txt| {
                        txt.txt_data()
                            .iter()
                            .map(|data| String::from_utf8_lossy(data))
                            .collect::<String>()
                    })
                    .collect();
                debug!(name, count = records.len(), "TXT lookup");
                records
            }
            Err(err) => {
                debug!(name, %err, "TXT lookup failed");
                Vec::new()
            }
        }
    }

    /// Drop hickory's internal record cache.
    pub fn clear_cache(&self) {
        self.resolver.clear_cache();
        info!("resolver record cache cleared");
    }
}

fn to_ascii(domain: &str) -> std::result::Result<String, String> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err("domain is empty".to_string());
    }
    idna::domain_to_ascii(trimmed).map_err(|_| "domain could not be converted to ASCII".to_string())
}

fn normalize_exchange(exchange: &str) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}

/// Deliverability estimate from the shape of the MX record set:
/// 70 base, +10 for redundancy, +5 for depth, +15 for a well-known
/// provider exchange, capped at 100.
pub(crate) fn mx_deliverability_score(records: &[MxHost]) -> u8 {
    let mut score: u32 = 70;
    if records.len() > 1 {
        score += 10;
    }
    if records.len() > 2 {
        score += 5;
    }
    if records.iter().any(|mx| {
        WELL_KNOWN_PROVIDERS
            .iter()
            .any(|provider| mx.exchange.contains(provider))
    }) {
        score += 15;
    }
    score.min(100) as u8
}

//! Domain health probing: SPF and DMARC presence, blacklist membership and
//! a reputation estimate.
//!
//! DKIM is never probed: selectors are not discoverable without prior
//! knowledge, so the field stays `false` and only participates in scoring.
//! TXT lookups that fail are read as "record not present" and never fail
//! the overall validation.

use std::sync::Arc;

use tracing::debug;

use crate::dns::DomainResolver;
use crate::DomainHealth;

/// Providers with established delivery reputation.
const TRUSTED_PROVIDERS: &[&str] = &[
    "gmail.com",
    "outlook.com",
    "yahoo.com",
    "hotmail.com",
    "icloud.com",
    "aol.com",
    "protonmail.com",
];

/// Static disallowed set. Stands in for a real-time blackhole list lookup;
/// swapping in an RBL later means replacing `is_blacklisted` only.
const BLACKLISTED_DOMAINS: &[&str] = &[
    "spam.example.com",
    "blacklisted.example.com",
    "banned.example.org",
];

/// TLDs that drag reputation down.
const PENALIZED_TLDS: &[&str] = &["tk", "ml", "ga", "cf"];

/// TLDs common enough that they carry no corporate signal.
const COMMON_TLDS: &[&str] = &["com", "net", "org", "io", "co", "edu", "gov", "info"];

/// Probes domain-level authentication records and reputation.
pub struct HealthProbe {
    resolver: Arc<DomainResolver>,
}

impl HealthProbe {
    pub fn new(resolver: Arc<DomainResolver>) -> Self {
        Self { resolver }
    }

    /// Full health snapshot for `domain` (expected in ASCII form).
    pub async fn check(&self, domain: &str) -> DomainHealth {
        let spf = self.has_spf(domain).await;
        let dmarc = self.has_dmarc(domain).await;
        let dkim = false;
        let blacklisted = Self::is_blacklisted(domain);
        let reputation = domain_reputation(domain, spf, dkim, dmarc);

        debug!(domain, spf, dmarc, blacklisted, reputation, "health probe complete");

        DomainHealth {
            spf,
            dkim,
            dmarc,
            blacklisted,
            reputation,
        }
    }

    async fn has_spf(&self, domain: &str) -> bool {
        self.resolver
            .txt_records(domain)
            .await
            .iter()
            .any(|record| record.trim().to_lowercase().starts_with("v=spf1"))
    }

    async fn has_dmarc(&self, domain: &str) -> bool {
        let dmarc_name = format!("_dmarc.{domain}");
        self.resolver
            .txt_records(&dmarc_name)
            .await
            .iter()
            .any(|record| record.trim().to_lowercase().starts_with("v=dmarc1"))
    }

    pub fn is_blacklisted(domain: &str) -> bool {
        let lowered = domain.to_lowercase();
        BLACKLISTED_DOMAINS.contains(&lowered.as_str())
    }
}

/// Reputation estimate in [0, 100].
///
/// 50 base, +40 trusted provider, +20 corporate signal, +5 per positive
/// SPF/DKIM, +10 for DMARC, -30 for penalized TLDs.
pub fn domain_reputation(domain: &str, spf: bool, dkim: bool, dmarc: bool) -> u8 {
    let lowered = domain.to_lowercase();
    let mut reputation: i32 = 50;

    if TRUSTED_PROVIDERS.contains(&lowered.as_str()) {
        reputation += 40;
    } else if looks_corporate(&lowered) {
        reputation += 20;
    }

    if spf {
        reputation += 5;
    }
    if dkim {
        reputation += 5;
    }
    if dmarc {
        reputation += 10;
    }

    if lowered
        .rsplit('.')
        .next()
        .is_some_and(|tld| PENALIZED_TLDS.contains(&tld))
    {
        reputation -= 30;
    }

    reputation.clamp(0, 100) as u8
}

fn looks_corporate(domain: &str) -> bool {
    if domain.contains("corp") || domain.contains("company") {
        return true;
    }
    // A TLD outside the mainstream set suggests a branded or country
    // corporate registration rather than a throwaway.
    domain
        .rsplit('.')
        .next()
        .is_some_and(|tld| !COMMON_TLDS.contains(&tld) && !PENALIZED_TLDS.contains(&tld))
}

//! Typo detection against known misspellings of major mail providers.
//!
//! Three tiers, in order of confidence: an exact misspelling map (95), a
//! TLD-only substitution table (90), and a bounded Levenshtein search over
//! the popular-domain whitelist (80). Domains that are themselves on the
//! whitelist are never "corrected" to a neighbor.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use textdistance::str::levenshtein;
use tracing::debug;

/// Popular domains used both as the whitelist (never corrected) and as the
/// target set for the edit-distance search. Kept as a slice so the nearest
/// match is deterministic.
const POPULAR_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "icloud.com",
    "protonmail.com",
    "mail.com",
    "zoho.com",
    "yandex.com",
    "gmx.com",
    "live.com",
    "msn.com",
    "me.com",
    "fastmail.com",
    "googlemail.com",
    "ymail.com",
];

/// Domain-level misspellings observed in real signup traffic.
const KNOWN_MISSPELLINGS: &[(&str, &str)] = &[
    ("gmai.com", "gmail.com"),
    ("gmial.com", "gmail.com"),
    ("gamil.com", "gmail.com"),
    ("gmali.com", "gmail.com"),
    ("gnail.com", "gmail.com"),
    ("gmaill.com", "gmail.com"),
    ("gmailc.om", "gmail.com"),
    ("gmail.co", "gmail.com"),
    ("yaho.com", "yahoo.com"),
    ("yahooo.com", "yahoo.com"),
    ("yhoo.com", "yahoo.com"),
    ("yaoo.com", "yahoo.com"),
    ("hotmial.com", "hotmail.com"),
    ("hotmal.com", "hotmail.com"),
    ("hotmil.com", "hotmail.com"),
    ("hotamil.com", "hotmail.com"),
    ("hotmali.com", "hotmail.com"),
    ("outlok.com", "outlook.com"),
    ("outloo.com", "outlook.com"),
    ("outlookk.com", "outlook.com"),
    ("iclod.com", "icloud.com"),
    ("icloud.co", "icloud.com"),
    ("protonmai.com", "protonmail.com"),
    ("aoll.com", "aol.com"),
];

/// TLD-only slips: the second-level domain is right, the TLD is mistyped.
const TLD_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("con", "com"),
    ("cmo", "com"),
    ("ocm", "com"),
    ("vom", "com"),
    ("comm", "com"),
    ("cim", "com"),
    ("nte", "net"),
    ("ent", "net"),
    ("ogr", "org"),
    ("orgg", "org"),
];

/// Maximum edit distance considered a plausible typo.
const MAX_EDIT_DISTANCE: usize = 2;

/// Outcome of a typo check. `suggestion` carries the full corrected address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypoReport {
    pub typo_detected: bool,
    pub suggestion: Option<String>,
    /// Structural issues flagged without a suggestion
    pub issues: Vec<String>,
    /// Confidence in [0, 100]; 0 when no typo was detected
    pub confidence: u8,
}

impl TypoReport {
    fn clean() -> Self {
        Self {
            typo_detected: false,
            suggestion: None,
            issues: Vec::new(),
            confidence: 0,
        }
    }
}

/// Detector over a fixed misspelling corpus. Immutable after construction.
pub struct TypoDetector {
    misspellings: HashMap<&'static str, &'static str>,
    tld_fixes: HashMap<&'static str, &'static str>,
    whitelist: HashSet<&'static str>,
}

impl TypoDetector {
    pub fn new() -> Self {
        let misspellings: HashMap<_, _> = KNOWN_MISSPELLINGS.iter().copied().collect();
        let tld_fixes: HashMap<_, _> = TLD_SUBSTITUTIONS.iter().copied().collect();
        let whitelist: HashSet<_> = POPULAR_DOMAINS.iter().copied().collect();
        debug!(
            misspellings = misspellings.len(),
            providers = whitelist.len(),
            "typo detector initialized"
        );
        Self {
            misspellings,
            tld_fixes,
            whitelist,
        }
    }

    /// Check `email` for a likely domain typo.
    pub fn suggest(&self, email: &str) -> TypoReport {
        let mut report = TypoReport::clean();

        let Some((local, domain)) = email.split_once('@') else {
            report.issues.push("missing '@' separator".to_string());
            return report;
        };
        if local.is_empty() {
            report.issues.push("empty local part".to_string());
            return report;
        }
        if domain.is_empty() {
            report.issues.push("empty domain".to_string());
            return report;
        }

        let domain_lower = domain.to_lowercase();

        if !domain_lower.contains('.') {
            report
                .issues
                .push("domain has no top-level domain".to_string());
        }
        if domain_lower.contains("..") {
            report
                .issues
                .push("domain contains consecutive dots".to_string());
        }
        if email.chars().any(|c| c.is_whitespace()) {
            report.issues.push("address contains whitespace".to_string());
        }

        // Popular domains are never corrected; this prevents false positives
        // on gmail.com and its peers.
        if self.whitelist.contains(domain_lower.as_str()) {
            return report;
        }

        if let Some(canonical) = self.misspellings.get(domain_lower.as_str()) {
            debug!(domain = %domain_lower, canonical, "exact misspelling match");
            report.typo_detected = true;
            report.suggestion = Some(format!("{local}@{canonical}"));
            report.confidence = 95;
            return report;
        }

        if let Some((sld, tld)) = domain_lower.rsplit_once('.') {
            if let Some(fixed) = self.tld_fixes.get(tld) {
                let candidate = format!("{sld}.{fixed}");
                debug!(domain = %domain_lower, candidate = %candidate, "TLD substitution");
                report.typo_detected = true;
                report.suggestion = Some(format!("{local}@{candidate}"));
                report.confidence = 90;
                return report;
            }
        }

        if let Some(nearest) = self.nearest_popular(&domain_lower) {
            debug!(domain = %domain_lower, nearest, "edit-distance match");
            report.typo_detected = true;
            report.suggestion = Some(format!("{local}@{nearest}"));
            report.confidence = 80;
        }

        report
    }

    /// Closest whitelist entry within the edit-distance bound, if any.
    fn nearest_popular(&self, domain: &str) -> Option<&'static str> {
        let mut best: Option<(&'static str, usize)> = None;
        for candidate in POPULAR_DOMAINS {
            let distance = levenshtein(domain, candidate);
            if distance == 0 || distance > MAX_EDIT_DISTANCE {
                continue;
            }
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((candidate, distance));
            }
        }
        best.map(|(candidate, _)| candidate)
    }

    pub fn provider_count(&self) -> usize {
        self.whitelist.len()
    }

    pub fn misspelling_count(&self) -> usize {
        self.misspellings.len()
    }
}

impl Default for TypoDetector {
    fn default() -> Self {
        Self::new()
    }
}

//! Disposable domain detection.
//!
//! Membership in the loaded blocklist is tested through a Bloom filter with
//! a configurable false positive rate; a built-in fallback set keeps the
//! classifier useful when no blocklist file is present. Pattern rules and a
//! broader themed catalogue catch providers the lists have not caught up
//! with yet.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use fastbloom::BloomFilter;
use regex::Regex;
use tracing::{debug, info, warn};

/// Well-known disposable providers used when no blocklist file is loaded,
/// and as an exact-membership layer in front of the Bloom filter.
const FALLBACK_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "10minutemail.net",
    "20minutemail.com",
    "33mail.com",
    "anonbox.net",
    "burnermail.io",
    "dispostable.com",
    "emailondeck.com",
    "fakeinbox.com",
    "getairmail.com",
    "getnada.com",
    "guerrillamail.com",
    "guerrillamail.net",
    "incognitomail.org",
    "mail-temp.com",
    "maildrop.cc",
    "mailinator.com",
    "mailnesia.com",
    "mintemail.com",
    "mohmal.com",
    "mytemp.email",
    "sharklasers.com",
    "spam4.me",
    "spamgourmet.com",
    "tempail.com",
    "temp-mail.org",
    "tempinbox.com",
    "tempmail.net",
    "tempmailo.com",
    "tempmail.org",
    "throwawaymail.com",
    "trashmail.com",
    "trashmail.net",
    "yopmail.com",
    "yopmail.fr",
];

/// TLDs handed out free of charge and heavily abused by throwaway services.
const SUSPICIOUS_TLDS: &[&str] = &["tk", "ml", "ga", "cf"];

/// Primary pattern rules: a single match classifies the domain.
const PATTERN_RULES: &[&str] = &[
    r"temp.*mail",
    r"\d+min",
    r"throwaway",
    r"disposable",
    r"trash.*mail",
    r"fake.*mail",
    r"burner",
];

/// Broader themed catalogue: two or more matches classify the domain.
/// Themes: lifetime, discard action, purpose, anonymity.
const CATALOGUE_RULES: &[&str] = &[
    r"\d+(min|hour|day)",
    r"minute",
    r"temp",
    r"short",
    r"expir",
    r"throw",
    r"trash",
    r"burn",
    r"discard",
    r"destroy",
    r"spam",
    r"junk",
    r"fake",
    r"dummy",
    r"nospam",
    r"anon",
    r"hide",
    r"priv",
    r"secret",
    r"stealth",
];

/// Digit share above which a `mail`-themed name is treated as generated.
const DIGIT_RATIO_THRESHOLD: f64 = 0.3;

/// Classifier over the disposable-domain corpus. Immutable after load.
pub struct DisposableClassifier {
    filter: Option<BloomFilter>,
    loaded_count: usize,
    fallback: HashSet<&'static str>,
    patterns: Vec<Regex>,
    catalogue: Vec<Regex>,
}

impl DisposableClassifier {
    /// Load the blocklist from `path`. A missing or unreadable file is
    /// non-fatal: the built-in fallback set is used alone.
    pub fn from_file(path: Option<&Path>, false_positive_rate: f64) -> Self {
        match path {
            Some(path) => match fs::read_to_string(path) {
                Ok(content) => Self::from_list_txt(&content, false_positive_rate),
                Err(err) => {
                    warn!(path = %path.display(), %err, "disposable blocklist not loaded, using fallback set");
                    Self::builtin()
                }
            },
            None => Self::builtin(),
        }
    }

    /// Build the classifier from blocklist text: one domain per line,
    /// `#` comments and blank lines ignored.
    pub fn from_list_txt(content: &str, false_positive_rate: f64) -> Self {
        let domains: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_lowercase)
            .collect();

        if domains.is_empty() {
            warn!("disposable blocklist was empty, using fallback set");
            return Self::builtin();
        }

        let loaded_count = domains.len();
        let filter = BloomFilter::with_false_pos(false_positive_rate).items(domains);

        info!(domains = loaded_count, "disposable blocklist loaded");

        Self {
            filter: Some(filter),
            loaded_count,
            fallback: FALLBACK_DOMAINS.iter().copied().collect(),
            patterns: compile(PATTERN_RULES),
            catalogue: compile(CATALOGUE_RULES),
        }
    }

    /// Classifier backed only by the built-in fallback set and patterns.
    pub fn builtin() -> Self {
        Self {
            filter: None,
            loaded_count: 0,
            fallback: FALLBACK_DOMAINS.iter().copied().collect(),
            patterns: compile(PATTERN_RULES),
            catalogue: compile(CATALOGUE_RULES),
        }
    }

    /// Whether `domain` belongs to a disposable provider.
    pub fn is_disposable(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();

        if self.in_blocklist(&domain) {
            debug!(%domain, "blocklist match");
            return true;
        }

        // Subdomains inherit their registered parent's classification.
        if let Some(parent) = registered_parent(&domain) {
            if self.in_blocklist(&parent) {
                debug!(%domain, %parent, "parent blocklist match");
                return true;
            }
        }

        if self.patterns.iter().any(|p| p.is_match(&domain)) {
            debug!(%domain, "pattern rule match");
            return true;
        }

        if self.matches_heuristics(&domain) {
            debug!(%domain, "heuristic catalogue match");
            return true;
        }

        if let Some(tld) = domain.rsplit('.').next() {
            if SUSPICIOUS_TLDS.contains(&tld) {
                debug!(%domain, %tld, "suspicious TLD");
                return true;
            }
        }

        if digit_ratio(&domain) > DIGIT_RATIO_THRESHOLD && domain.contains("mail") {
            debug!(%domain, "digit-heavy mail domain");
            return true;
        }

        false
    }

    /// Heuristic-only classification: two or more catalogue matches.
    pub fn matches_heuristics(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        self.catalogue
            .iter()
            .filter(|p| p.is_match(&domain))
            .count()
            >= 2
    }

    /// Risk contribution of `domain` in [0, 100].
    pub fn risk_score(&self, domain: &str) -> u8 {
        let lowered = domain.to_lowercase();

        if self.in_blocklist(&lowered)
            || registered_parent(&lowered).is_some_and(|p| self.in_blocklist(&p))
        {
            return 95;
        }
        if self.patterns.iter().any(|p| p.is_match(&lowered)) {
            return 85;
        }
        if self.matches_heuristics(&lowered) {
            return 75;
        }
        if lowered
            .rsplit('.')
            .next()
            .is_some_and(|tld| SUSPICIOUS_TLDS.contains(&tld))
        {
            return 60;
        }
        if digit_ratio(&lowered) > DIGIT_RATIO_THRESHOLD && lowered.contains("mail") {
            return 55;
        }
        10
    }

    fn in_blocklist(&self, domain: &str) -> bool {
        if self.fallback.contains(domain) {
            return true;
        }
        self.filter
            .as_ref()
            .is_some_and(|filter| filter.contains(&domain.to_string()))
    }

    /// Number of domains loaded from the blocklist file (0 when running on
    /// the fallback set).
    pub fn domain_count(&self) -> usize {
        self.loaded_count
    }

    pub fn fallback_count(&self) -> usize {
        self.fallback.len()
    }
}

fn compile(rules: &[&str]) -> Vec<Regex> {
    // The rule sets are static and verified by tests, so a rule that fails
    // to compile is dropped rather than taking the classifier down.
    rules
        .iter()
        .filter_map(|rule| match Regex::new(rule) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(rule, %err, "skipping unparseable pattern rule");
                None
            }
        })
        .collect()
}

/// The last two labels of a subdomain, or `None` for apex domains.
fn registered_parent(domain: &str) -> Option<String> {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() <= 2 {
        return None;
    }
    Some(labels[labels.len() - 2..].join("."))
}

fn digit_ratio(domain: &str) -> f64 {
    if domain.is_empty() {
        return 0.0;
    }
    let digits = domain.chars().filter(|c| c.is_ascii_digit()).count();
    digits as f64 / domain.len() as f64
}

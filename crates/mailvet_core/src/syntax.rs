//! Address syntax validation per RFC 5321/5322 with pragmatic relaxations.
//!
//! Rules are enforced in a fixed order and the first failure is returned as
//! the rejection reason. Internationalized domains are normalized to their
//! punycode-ASCII form and re-validated; all later stages compare domains on
//! the ASCII form only.

use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::debug;

/// RFC 5321 total path limit plus pragmatic headroom.
pub const MAX_ADDRESS_LEN: usize = 320;
/// RFC 5321 local-part limit.
pub const MAX_LOCAL_LEN: usize = 64;
/// RFC 1035 domain name limit.
pub const MAX_DOMAIN_LEN: usize = 253;

/// atext specials permitted in an unquoted local part (RFC 5322 §3.2.3),
/// in addition to ASCII alphanumerics and the dot separator.
const ATEXT_SPECIALS: &str = "!#$%&'*+/=?^_`{|}~-";

/// Local parts identifying a function rather than a person.
const ROLE_LOCAL_PARTS: &[&str] = &[
    "abuse",
    "admin",
    "administrator",
    "billing",
    "careers",
    "contact",
    "enquiries",
    "help",
    "hello",
    "hostmaster",
    "hr",
    "info",
    "jobs",
    "marketing",
    "newsletter",
    "no-reply",
    "noreply",
    "office",
    "postmaster",
    "sales",
    "security",
    "service",
    "support",
    "team",
    "webmaster",
];

/// Consumer mail providers where the mailbox owner is an individual.
const FREE_PROVIDERS: &[&str] = &[
    "aol.com",
    "fastmail.com",
    "gmail.com",
    "gmx.com",
    "gmx.net",
    "googlemail.com",
    "hotmail.com",
    "icloud.com",
    "live.com",
    "mail.com",
    "me.com",
    "msn.com",
    "outlook.com",
    "proton.me",
    "protonmail.com",
    "yahoo.com",
    "yandex.com",
    "yandex.ru",
    "ymail.com",
    "zoho.com",
];

/// Domains that share Gmail's dot-and-plus normalization rules.
const GMAIL_FAMILY: &[&str] = &["gmail.com", "googlemail.com"];

/// A successfully parsed address. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    /// The input string, unchanged
    pub original: String,
    /// Local part as written (case preserved)
    pub local: String,
    /// Lowercased display form of the domain
    pub domain: String,
    /// Punycode-ASCII form used for all comparisons and DNS lookups
    pub ascii_domain: String,
    pub is_quoted: bool,
    pub is_international: bool,
}

impl ParsedAddress {
    /// Lowercased local part joined with the ASCII domain.
    pub fn normalized(&self) -> String {
        format!("{}@{}", self.local.to_lowercase(), self.ascii_domain)
    }
}

/// Parse and validate `input`.
///
/// Strict mode rejects quoted local parts and `+`-addressing.
/// `allow_international = false` rejects any non-ASCII domain label.
pub fn parse(input: &str, strict: bool, allow_international: bool) -> Result<ParsedAddress, String> {
    if input.len() > MAX_ADDRESS_LEN {
        return Err(format!(
            "address length {} exceeds maximum of {} characters",
            input.len(),
            MAX_ADDRESS_LEN
        ));
    }

    let at_count = input.matches('@').count();
    if at_count == 0 {
        return Err("address is missing the '@' separator".to_string());
    }
    if at_count > 1 {
        return Err("address contains more than one '@'".to_string());
    }

    // Exactly one '@' at this point, so the split cannot fail.
    let (local, domain) = input.split_once('@').ok_or("address is missing the '@' separator")?;

    let is_quoted = validate_local(local, strict)?;
    let (domain_lower, ascii_domain, is_international) =
        validate_domain(domain, allow_international)?;

    debug!(
        local_len = local.len(),
        domain = %ascii_domain,
        international = is_international,
        "address parsed"
    );

    Ok(ParsedAddress {
        original: input.to_string(),
        local: local.to_string(),
        domain: domain_lower,
        ascii_domain,
        is_quoted,
        is_international,
    })
}

/// Lenient decomposition used when syntax checking is disabled: the address
/// is split on the last '@' and normalized best-effort, with no rule
/// enforcement beyond the split itself.
pub fn parse_lenient(input: &str) -> Result<ParsedAddress, String> {
    let (local, domain) = input
        .rsplit_once('@')
        .ok_or_else(|| "address is missing the '@' separator".to_string())?;
    if local.is_empty() || domain.is_empty() {
        return Err("address has an empty local part or domain".to_string());
    }
    let is_international = domain.chars().any(|c| !c.is_ascii());
    let ascii_domain = idna::domain_to_ascii(domain).unwrap_or_else(|_| domain.to_lowercase());
    Ok(ParsedAddress {
        original: input.to_string(),
        local: local.to_string(),
        domain: domain.to_lowercase(),
        ascii_domain,
        is_quoted: false,
        is_international,
    })
}

/// Returns `Ok(is_quoted)` on success.
fn validate_local(local: &str, strict: bool) -> Result<bool, String> {
    if local.is_empty() {
        return Err("local part is empty".to_string());
    }
    if local.len() > MAX_LOCAL_LEN {
        return Err(format!(
            "local part length {} exceeds maximum of {} bytes",
            local.len(),
            MAX_LOCAL_LEN
        ));
    }

    if local.len() >= 2 && local.starts_with('"') && local.ends_with('"') {
        if strict {
            return Err("quoted local parts are not allowed in strict mode".to_string());
        }
        return validate_quoted_local(local).map(|_| true);
    }

    if local.starts_with('.') || local.ends_with('.') {
        return Err("local part cannot begin or end with '.'".to_string());
    }
    if local.contains("..") {
        return Err("local part cannot contain consecutive dots".to_string());
    }
    for c in local.chars() {
        if c == ' ' {
            return Err("local part contains unescaped whitespace".to_string());
        }
        if !c.is_ascii_alphanumeric() && c != '.' && !ATEXT_SPECIALS.contains(c) {
            return Err(format!("local part contains invalid character '{c}'"));
        }
    }
    if strict && local.contains('+') {
        return Err("'+' addressing is not allowed in strict mode".to_string());
    }

    Ok(false)
}

fn validate_quoted_local(local: &str) -> Result<(), String> {
    let inner = &local[1..local.len() - 1];
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if chars.next().is_none() {
                    return Err("quoted local part ends with a dangling escape".to_string());
                }
            }
            '"' => return Err("quoted local part contains an unescaped quote".to_string()),
            c if !c.is_ascii() || (c as u32) < 0x20 => {
                return Err(format!("quoted local part contains invalid character '{c}'"));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Returns `(lowercased display form, ascii form, is_international)`.
fn validate_domain(
    domain: &str,
    allow_international: bool,
) -> Result<(String, String, bool), String> {
    if domain.is_empty() {
        return Err("domain is empty".to_string());
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(format!(
            "domain length {} exceeds maximum of {} bytes",
            domain.len(),
            MAX_DOMAIN_LEN
        ));
    }
    if domain.chars().any(|c| c.is_whitespace()) {
        return Err("domain contains whitespace".to_string());
    }

    if domain.starts_with('[') {
        return validate_ip_literal(domain).map(|d| (d.clone(), d, false));
    }

    let is_international = domain.chars().any(|c| !c.is_ascii());
    let ascii = if is_international {
        if !allow_international {
            return Err("internationalized domains are not allowed".to_string());
        }
        idna::domain_to_ascii(domain)
            .map_err(|_| "domain could not be converted to ASCII".to_string())?
    } else {
        domain.to_ascii_lowercase()
    };

    validate_ascii_labels(&ascii)?;
    Ok((domain.to_lowercase(), ascii, is_international))
}

fn validate_ip_literal(domain: &str) -> Result<String, String> {
    let inner = domain
        .strip_prefix('[')
        .and_then(|d| d.strip_suffix(']'))
        .ok_or("unterminated address literal")?;

    if let Some(v6) = inner.strip_prefix("IPv6:") {
        v6.parse::<Ipv6Addr>()
            .map_err(|_| "invalid IPv6 address literal".to_string())?;
    } else {
        inner
            .parse::<Ipv4Addr>()
            .map_err(|_| "invalid IPv4 address literal".to_string())?;
    }
    Ok(domain.to_ascii_lowercase())
}

fn validate_ascii_labels(ascii: &str) -> Result<(), String> {
    let labels: Vec<&str> = ascii.split('.').collect();
    if labels.len() < 2 {
        return Err("domain must contain at least two labels".to_string());
    }

    for label in &labels {
        if label.is_empty() {
            return Err("domain contains an empty label".to_string());
        }
        if label.len() > 63 {
            return Err(format!("domain label '{label}' exceeds 63 bytes"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("domain label '{label}' cannot begin or end with '-'"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("domain label '{label}' contains invalid characters"));
        }
    }

    // Punycode TLDs (xn--) carry digits and hyphens and are exempt from
    // the alphabetic rule.
    let tld = labels[labels.len() - 1];
    if tld.len() < 2 {
        return Err("top-level domain must be at least 2 characters".to_string());
    }
    if !tld.starts_with("xn--") && !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err("top-level domain must be alphabetic".to_string());
    }

    Ok(())
}

/// Whether the local part names a function rather than a person.
///
/// A `+` alias is stripped before the comparison, so `support+eu@…` is
/// still role-based.
pub fn is_role_based(local: &str) -> bool {
    let base = local.split('+').next().unwrap_or(local).to_lowercase();
    ROLE_LOCAL_PARTS.contains(&base.as_str())
}

pub fn has_plus_alias(local: &str) -> bool {
    !local.starts_with('"') && local.contains('+')
}

pub fn is_free_provider(ascii_domain: &str) -> bool {
    FREE_PROVIDERS.contains(&ascii_domain)
}

/// Canonical Gmail form for Gmail-family domains: dots removed from the
/// local part, `+tag` stripped, domain folded to `gmail.com`. Returns `None`
/// for every other domain.
pub fn gmail_normalized(local: &str, ascii_domain: &str) -> Option<String> {
    if !GMAIL_FAMILY.contains(&ascii_domain) {
        return None;
    }
    let base = local.split('+').next().unwrap_or(local);
    let collapsed: String = base
        .to_lowercase()
        .chars()
        .filter(|c| *c != '.')
        .collect();
    Some(format!("{collapsed}@gmail.com"))
}

//! Validator coordinator: drives the stages in a fixed order, folds their
//! outputs into one [`ValidationResult`] and computes the final verdict.
//!
//! Stage order: syntax → typo → disposable → domain → MX → SMTP → health →
//! score. Later stages are skipped when an earlier stage already settled
//! the outcome (a rejected parse never reaches DNS; SMTP is only probed
//! when an MX was found).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::cache::ValidationCaches;
use crate::disposable::DisposableClassifier;
use crate::dns::DomainResolver;
use crate::health::HealthProbe;
use crate::score;
use crate::smtp::SmtpProber;
use crate::syntax::{self, ParsedAddress};
use crate::typo::TypoDetector;
use crate::{
    EngineConfig, Result, SmtpDeliverability, ValidationOptions, ValidationResult,
    ValidationStatus,
};

/// The validation engine. Stateless across requests; safe to share behind
/// an `Arc` and call concurrently.
pub struct EmailValidator {
    config: EngineConfig,
    resolver: Arc<DomainResolver>,
    health: HealthProbe,
    typo: TypoDetector,
    disposable: DisposableClassifier,
    caches: ValidationCaches,
}

impl EmailValidator {
    /// Build the engine: DNS resolver, corpora and caches are initialized
    /// once here and shared by every validation.
    pub fn new(config: EngineConfig) -> Result<Self> {
        info!("initializing validation engine");

        let resolver = Arc::new(DomainResolver::new(
            config.dns_timeout_ms,
            config.dns_attempts,
        )?);

        let disposable = DisposableClassifier::from_file(
            config.disposable_list_path.as_deref(),
            config.bloom_filter_fp_rate,
        );

        let health = HealthProbe::new(Arc::clone(&resolver));
        let typo = TypoDetector::new();
        let caches = ValidationCaches::new();

        info!(
            disposable_domains = disposable.domain_count(),
            fallback_domains = disposable.fallback_count(),
            "validation engine initialized"
        );

        Ok(Self {
            config,
            resolver,
            health,
            typo,
            disposable,
            caches,
        })
    }

    /// Validate one address. Never returns an error: every failure mode is
    /// folded into the result record.
    #[instrument(skip(self, options), fields(email_len = email.len()))]
    pub async fn validate(&self, email: &str, options: &ValidationOptions) -> ValidationResult {
        let started = Instant::now();
        let email = email.trim();
        let mut result = ValidationResult::new(email);
        let strict = options.strict_mode;
        let use_cache = options.enable_cache;

        // Stage 1: syntax. The parse also provides the local/domain
        // decomposition every later stage needs, so a lenient split runs
        // even when the syntax check is disabled.
        let parsed = if options.check_syntax {
            result.checks_performed.push("syntax".to_string());
            match syntax::parse(email, strict, options.allow_international) {
                Ok(parsed) => parsed,
                Err(reason) => {
                    debug!(%reason, "address rejected by parser");
                    return self.finalize(result, ValidationStatus::Invalid, reason, strict, started);
                }
            }
        } else {
            match syntax::parse_lenient(email) {
                Ok(parsed) => parsed,
                Err(reason) => {
                    return self.finalize(result, ValidationStatus::Invalid, reason, strict, started);
                }
            }
        };

        result.syntax_valid = true;
        result.factors.format = true;
        self.fill_address_context(&mut result, &parsed);

        // Stage 2: typo detection.
        if options.check_typos {
            result.checks_performed.push("typo".to_string());
            let report = match use_cache.then(|| self.caches.typo.get(email)).flatten() {
                Some(cached) => cached,
                None => {
                    let report = self.typo.suggest(email);
                    if use_cache {
                        self.caches.typo.insert(email, report.clone());
                    }
                    report
                }
            };
            result.typo_detected = report.typo_detected;
            result.suggestion = report.suggestion;
        }

        // Stage 3: disposable classification.
        if options.check_disposable {
            result.checks_performed.push("disposable".to_string());
            let domain_key = parsed.ascii_domain.clone();
            result.disposable = match use_cache
                .then(|| self.caches.disposable.get(&domain_key))
                .flatten()
            {
                Some(cached) => cached,
                None => {
                    let disposable = self.disposable.is_disposable(&parsed.ascii_domain);
                    if use_cache {
                        self.caches.disposable.insert(domain_key, disposable);
                    }
                    disposable
                }
            };
        }

        // Stage 4: domain resolution.
        let mut mx_records = Vec::new();
        let mut mx_checked = false;
        if options.check_domain {
            result.checks_performed.push("domain".to_string());
            let resolution = match use_cache
                .then(|| self.caches.domain.get(&parsed.ascii_domain))
                .flatten()
            {
                Some(cached) => cached,
                None => {
                    let resolution = self.resolver.resolve_domain(&parsed.ascii_domain).await;
                    if use_cache {
                        self.caches
                            .domain
                            .insert(parsed.ascii_domain.clone(), resolution.clone());
                    }
                    resolution
                }
            };
            result.domain_valid = resolution.valid;
            result.factors.domain = resolution.valid;

            if !resolution.valid {
                let reason = resolution
                    .reason
                    .unwrap_or_else(|| "domain does not resolve".to_string());
                return self.finalize(result, ValidationStatus::Invalid, reason, strict, started);
            }
        }

        // Stage 5: MX lookup.
        if options.check_mx {
            result.checks_performed.push("mx".to_string());
            mx_checked = true;
            let resolution = match use_cache
                .then(|| self.caches.mx.get(&parsed.ascii_domain))
                .flatten()
            {
                Some(cached) => cached,
                None => {
                    let resolution = self.resolver.resolve_mx(&parsed.ascii_domain).await;
                    if use_cache {
                        self.caches
                            .mx
                            .insert(parsed.ascii_domain.clone(), resolution.clone());
                    }
                    resolution
                }
            };
            result.mx_found = resolution.found;
            result.factors.mx = resolution.found;
            result.factors.deliverability = resolution.deliverability_score;
            mx_records = resolution.records;
        }

        // Stage 6: SMTP probe, only when an MX was found.
        if options.check_smtp && result.mx_found {
            result.checks_performed.push("smtp".to_string());
            let from_domain = options
                .smtp_from_domain
                .clone()
                .unwrap_or_else(|| self.config.smtp_from_domain.clone());
            let prober = SmtpProber::new(
                from_domain,
                Duration::from_millis(options.smtp_timeout_ms),
            );

            // Lowest-priority MX first; the implicit-MX fallback leaves the
            // record list empty, in which case the domain itself is the
            // exchanger.
            let mx_host = mx_records
                .first()
                .map(|mx| mx.exchange.clone())
                .unwrap_or_else(|| parsed.ascii_domain.clone());

            let outcome = prober
                .probe(&parsed.normalized(), &parsed.ascii_domain, &mx_host)
                .await;
            result.smtp_deliverable = outcome.deliverable;
            result.factors.smtp = outcome.deliverable.is_yes();
            result.is_catch_all = outcome.is_catch_all;
            result.smtp_server_banner = outcome.banner;
            result.smtp_server_response = outcome.final_response;
            result.tls_supported = outcome.tls_supported;
            if let Some(reason) = outcome.reason {
                debug!(%reason, "SMTP probe inconclusive or negative");
            }
        } else if result.mx_found {
            // Probing disabled: the dialogue never ran, so the outcome is
            // genuinely unknown rather than negative.
            result.smtp_deliverable = SmtpDeliverability::Unknown;
        }

        // Stage 7: domain health.
        if options.check_domain || options.check_mx {
            result.checks_performed.push("health".to_string());
            let health = match use_cache
                .then(|| self.caches.health.get(&parsed.ascii_domain))
                .flatten()
            {
                Some(cached) => cached,
                None => {
                    let health = self.health.check(&parsed.ascii_domain).await;
                    if use_cache {
                        self.caches
                            .health
                            .insert(parsed.ascii_domain.clone(), health);
                    }
                    health
                }
            };
            result.domain_health = Some(health);
        }

        // Stage 8: scoring and verdict.
        let domain_reputation = result
            .domain_health
            .map(|health| health.reputation)
            .unwrap_or(50);
        result.factors.reputation = score::address_reputation(&parsed.local, domain_reputation);
        result.score = score::compute_score(&result, strict);

        let (status, reason) = verdict(&result, strict, mx_checked);
        self.finalize(result, status, reason, strict, started)
    }

    /// Contextual fields derived from the parsed address alone.
    fn fill_address_context(&self, result: &mut ValidationResult, parsed: &ParsedAddress) {
        result.normalized_email = Some(parsed.normalized());
        result.gmail_normalized = syntax::gmail_normalized(&parsed.local, &parsed.ascii_domain);
        result.is_role_based = syntax::is_role_based(&parsed.local);
        result.has_plus_alias = syntax::has_plus_alias(&parsed.local);
        result.is_international = parsed.is_international;
        result.is_free_provider = syntax::is_free_provider(&parsed.ascii_domain);
    }

    fn finalize(
        &self,
        mut result: ValidationResult,
        status: ValidationStatus,
        reason: String,
        strict: bool,
        started: Instant,
    ) -> ValidationResult {
        // The score is always re-derived from the record so that the two
        // never disagree, including on early returns.
        result.score = score::compute_score(&result, strict);
        result.status = status;
        result.reason = reason;
        result.validation_time_ms = started.elapsed().as_millis() as u64;
        debug!(
            status = ?result.status,
            score = result.score,
            elapsed_ms = result.validation_time_ms,
            "validation complete"
        );
        result
    }

    /// Shared caches, exposed for the bulk scheduler.
    pub(crate) fn caches(&self) -> &ValidationCaches {
        &self.caches
    }

    pub fn clear_caches(&self) {
        self.caches.clear_all();
        self.resolver.clear_cache();
        info!("validation caches cleared");
    }

    /// Engine statistics for monitoring endpoints.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            disposable_domains_loaded: self.disposable.domain_count(),
            disposable_fallback_domains: self.disposable.fallback_count(),
            typo_providers: self.typo.provider_count(),
            typo_misspellings: self.typo.misspelling_count(),
            cache_entries: self.caches.total_entries(),
        }
    }

    pub fn bulk_concurrency(&self) -> usize {
        self.config.bulk_concurrency
    }

    pub fn bulk_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.config.bulk_chunk_delay_ms)
    }
}

/// First-match-wins status table.
fn verdict(
    result: &ValidationResult,
    strict: bool,
    mx_checked: bool,
) -> (ValidationStatus, String) {
    if result.disposable {
        return (
            ValidationStatus::Risky,
            "Disposable email address detected".to_string(),
        );
    }
    if result
        .domain_health
        .is_some_and(|health| health.blacklisted)
    {
        return (
            ValidationStatus::Invalid,
            "Domain is blacklisted".to_string(),
        );
    }
    if mx_checked && !result.mx_found {
        return (
            ValidationStatus::Invalid,
            "Domain cannot receive emails (no MX records)".to_string(),
        );
    }
    // A valid verdict requires every positive stage to have passed, not
    // just the score: a skipped domain or MX stage caps the outcome at
    // risky no matter how high the remaining signals push it.
    if result.score >= score::valid_threshold(strict)
        && result.syntax_valid
        && result.domain_valid
        && result.mx_found
    {
        return (
            ValidationStatus::Valid,
            "Email appears to be valid and deliverable".to_string(),
        );
    }
    if result.score >= score::risky_threshold(strict) {
        return (
            ValidationStatus::Risky,
            "Email may be risky - proceed with caution".to_string(),
        );
    }
    (
        ValidationStatus::Invalid,
        "Email is likely invalid or undeliverable".to_string(),
    )
}

/// Statistics about the engine's corpora and caches.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub disposable_domains_loaded: usize,
    pub disposable_fallback_domains: usize,
    pub typo_providers: usize,
    pub typo_misspellings: usize,
    pub cache_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine() -> EmailValidator {
        let config = EngineConfig {
            disposable_list_path: None,
            ..EngineConfig::default()
        };
        EmailValidator::new(config).expect("engine construction")
    }

    /// Options that keep every stage off the network.
    fn offline_options() -> ValidationOptions {
        ValidationOptions {
            check_domain: false,
            check_mx: false,
            check_smtp: false,
            ..ValidationOptions::default()
        }
    }

    #[tokio::test]
    async fn rejected_parse_short_circuits() {
        let validator = engine();
        let result = validator
            .validate("invalid-email", &ValidationOptions::default())
            .await;

        assert!(!result.syntax_valid);
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert!(result.reason.contains("missing the '@'"), "{}", result.reason);
        assert_eq!(result.checks_performed, vec!["syntax".to_string()]);
        assert!(!result.domain_valid);
        assert!(!result.mx_found);
        assert_eq!(result.smtp_deliverable, SmtpDeliverability::No);
        assert_eq!(result.score, 0);
    }

    #[tokio::test]
    async fn missing_tld_is_rejected() {
        let validator = engine();
        let result = validator
            .validate("a@b", &ValidationOptions::default())
            .await;
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert_eq!(result.checks_performed, vec!["syntax".to_string()]);
    }

    #[tokio::test]
    async fn disposable_domain_is_risky_without_network() {
        let validator = engine();
        let result = validator
            .validate("user@10minutemail.com", &offline_options())
            .await;

        assert!(result.syntax_valid);
        assert!(result.disposable);
        assert_eq!(result.status, ValidationStatus::Risky);
        assert_eq!(result.reason, "Disposable email address detected");
        assert_ne!(result.status, ValidationStatus::Valid);
    }

    #[tokio::test]
    async fn typo_is_detected_and_penalized() {
        let validator = engine();
        let result = validator
            .validate("user@gmai.com", &offline_options())
            .await;

        assert!(result.typo_detected);
        assert_eq!(result.suggestion.as_deref(), Some("user@gmail.com"));
        assert!(
            matches!(
                result.status,
                ValidationStatus::Risky | ValidationStatus::Invalid
            ),
            "status was {:?}",
            result.status
        );
    }

    #[tokio::test]
    async fn gmail_context_fields_are_populated() {
        let validator = engine();
        let result = validator
            .validate("John.Doe+news@gmail.com", &offline_options())
            .await;

        assert!(result.has_plus_alias);
        assert!(result.is_free_provider);
        assert_eq!(
            result.gmail_normalized.as_deref(),
            Some("johndoe@gmail.com")
        );
        assert_eq!(
            result.normalized_email.as_deref(),
            Some("john.doe+news@gmail.com")
        );
    }

    #[tokio::test]
    async fn gmail_dot_and_plus_variants_normalize_identically() {
        let validator = engine();
        let opts = offline_options();
        let a = validator.validate("john.doe@gmail.com", &opts).await;
        let b = validator.validate("johndoe+tag@gmail.com", &opts).await;
        assert_eq!(a.gmail_normalized, b.gmail_normalized);
    }

    #[tokio::test]
    async fn role_accounts_are_flagged() {
        let validator = engine();
        let result = validator
            .validate("support@example.com", &offline_options())
            .await;
        assert!(result.is_role_based);
    }

    #[tokio::test]
    async fn strict_mode_rejects_plus_addressing() {
        let validator = engine();
        let opts = ValidationOptions {
            strict_mode: true,
            ..offline_options()
        };
        let result = validator.validate("user+tag@example.com", &opts).await;
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert!(result.reason.contains("'+'"), "{}", result.reason);
    }

    #[tokio::test]
    async fn international_flag_survives_the_pipeline() {
        let validator = engine();
        let result = validator
            .validate("alice@bücher.example", &offline_options())
            .await;
        assert!(result.syntax_valid);
        assert!(result.is_international);
    }

    #[tokio::test]
    async fn repeated_validation_is_cache_stable() {
        let validator = engine();
        let opts = offline_options();

        let first = validator.validate("user@gmai.com", &opts).await;
        let second = validator.validate("user@gmai.com", &opts).await;

        assert_eq!(first.status, second.status);
        assert_eq!(first.score, second.score);
        assert_eq!(first.suggestion, second.suggestion);
        assert_eq!(first.disposable, second.disposable);
        assert_eq!(first.checks_performed, second.checks_performed);
    }

    #[tokio::test]
    async fn score_is_rederivable_from_the_record() {
        let validator = engine();
        let result = validator
            .validate("john.doe@gmail.com", &offline_options())
            .await;
        assert_eq!(result.score, score::compute_score(&result, false));
    }

    #[tokio::test]
    async fn disabled_syntax_check_still_decomposes() {
        let validator = engine();
        let opts = ValidationOptions {
            check_syntax: false,
            ..offline_options()
        };
        let result = validator.validate("weird local@example.com", &opts).await;
        assert!(result.syntax_valid);
        assert!(!result
            .checks_performed
            .contains(&"syntax".to_string()));
    }

    #[tokio::test]
    async fn whitespace_only_input_is_invalid() {
        let validator = engine();
        let result = validator
            .validate("   ", &ValidationOptions::default())
            .await;
        assert_eq!(result.status, ValidationStatus::Invalid);
    }

    #[test]
    fn verdict_table_order() {
        let mut result = ValidationResult::new("user@example.com");
        result.syntax_valid = true;
        result.domain_valid = true;
        result.disposable = true;
        result.score = 95;
        // Disposable wins over a high score.
        let (status, reason) = verdict(&result, false, true);
        assert_eq!(status, ValidationStatus::Risky);
        assert!(reason.contains("Disposable"));

        result.disposable = false;
        result.domain_health = Some(crate::DomainHealth {
            spf: false,
            dkim: false,
            dmarc: false,
            blacklisted: true,
            reputation: 10,
        });
        let (status, reason) = verdict(&result, false, true);
        assert_eq!(status, ValidationStatus::Invalid);
        assert!(reason.contains("blacklisted"));

        result.domain_health = None;
        result.mx_found = false;
        let (status, reason) = verdict(&result, false, true);
        assert_eq!(status, ValidationStatus::Invalid);
        assert!(reason.contains("no MX records"));

        result.mx_found = true;
        result.score = 90;
        let (status, _) = verdict(&result, false, true);
        assert_eq!(status, ValidationStatus::Valid);
        // 90 exactly meets the strict threshold too.
        let (status, _) = verdict(&result, true, true);
        assert_eq!(status, ValidationStatus::Valid);

        result.score = 87;
        let (status, _) = verdict(&result, true, true);
        assert_eq!(status, ValidationStatus::Risky);

        result.score = 70;
        let (status, _) = verdict(&result, false, true);
        assert_eq!(status, ValidationStatus::Risky);

        result.score = 40;
        let (status, _) = verdict(&result, false, true);
        assert_eq!(status, ValidationStatus::Invalid);
    }

    #[test]
    fn valid_requires_every_positive_stage() {
        // A skipped domain stage leaves domain_valid false; even a score
        // past the threshold must not produce a valid verdict.
        let mut result = ValidationResult::new("user@example.com");
        result.syntax_valid = true;
        result.domain_valid = false;
        result.mx_found = true;
        result.score = 95;
        let (status, _) = verdict(&result, false, false);
        assert_eq!(status, ValidationStatus::Risky);

        // Same for an unchecked MX stage.
        result.domain_valid = true;
        result.mx_found = false;
        let (status, _) = verdict(&result, false, false);
        assert_eq!(status, ValidationStatus::Risky);

        // With every stage passed the same score is valid.
        result.mx_found = true;
        let (status, _) = verdict(&result, false, true);
        assert_eq!(status, ValidationStatus::Valid);
    }

    #[test]
    fn stats_reflect_the_corpora() {
        let validator = engine();
        let stats = validator.stats();
        assert_eq!(stats.disposable_domains_loaded, 0);
        assert!(stats.disposable_fallback_domains > 0);
        assert!(stats.typo_providers > 0);
        assert!(stats.typo_misspellings > 0);
    }
}

//! Bulk validation scheduling.
//!
//! Inputs are de-duplicated, processed in fixed-size chunks with a bounded
//! number of in-flight validations, and written back at their original
//! index so the response preserves input order regardless of completion
//! order. A failure in one address never fails the batch: the slot is
//! filled with an `error`-status result and processing continues.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::{EmailValidator, ValidationOptions, ValidationResult, ValidationStatus};

/// Input-share thresholds that trigger recommendations.
const DISPOSABLE_WARNING_RATIO: f64 = 0.10;
const INVALID_WARNING_RATIO: f64 = 0.20;

/// Outcome of a bulk validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkReport {
    /// Number of inputs received, before de-duplication
    pub total: usize,
    /// Number of addresses actually validated
    pub processed: usize,
    pub duplicates_removed: usize,
    /// One result per processed address, in input order
    pub results: Vec<ValidationResult>,
    /// Addresses whose validation crashed (isolated from their peers)
    pub errors: Vec<BulkError>,
    pub validation_time_ms: u64,
    pub summary: BulkSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkError {
    pub email: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

/// Aggregate statistics over one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSummary {
    pub status_breakdown: BTreeMap<String, usize>,
    pub disposable_count: usize,
    pub typo_count: usize,
    pub average_score: f64,
    /// Up to ten most frequent domains
    pub top_domains: Vec<DomainCount>,
    /// Up to five most frequent verdict reasons
    pub common_reasons: Vec<ReasonCount>,
    pub recommendations: Vec<String>,
}

/// Fans validations out over the shared engine with bounded concurrency.
pub struct BulkValidator {
    validator: Arc<EmailValidator>,
}

impl BulkValidator {
    pub fn new(validator: Arc<EmailValidator>) -> Self {
        Self { validator }
    }

    /// Validate a collection of addresses.
    ///
    /// The engine imposes no upper bound on the input size; callers that
    /// need a cap (e.g. an HTTP layer) enforce it before calling.
    pub async fn validate_batch(
        &self,
        emails: &[String],
        options: &ValidationOptions,
    ) -> BulkReport {
        let started = Instant::now();
        let total = emails.len();

        let unique = deduplicate(emails, options.deduplicate);
        let duplicates_removed = total - unique.len();
        info!(
            total,
            unique = unique.len(),
            duplicates_removed,
            "starting bulk validation"
        );

        let chunk_size = options.batch_size.max(1);
        let semaphore = Arc::new(Semaphore::new(self.validator.bulk_concurrency().max(1)));
        let chunk_delay = self.validator.bulk_chunk_delay();

        let mut slots: Vec<Option<ValidationResult>> =
            (0..unique.len()).map(|_| None).collect();
        let mut errors = Vec::new();

        for chunk_start in (0..unique.len()).step_by(chunk_size) {
            let chunk_end = (chunk_start + chunk_size).min(unique.len());
            let mut tasks: FuturesUnordered<
                BoxFuture<'static, (usize, String, Result<ValidationResult, JoinError>)>,
            > = FuturesUnordered::new();

            for idx in chunk_start..chunk_end {
                let email = unique[idx].clone();

                if options.enable_cache {
                    if let Some(cached) = self.validator.caches().bulk.get(&email) {
                        debug!(email = %email, "bulk cache hit");
                        slots[idx] = Some(cached);
                        continue;
                    }
                }

                let validator = Arc::clone(&self.validator);
                let semaphore = Arc::clone(&semaphore);
                let opts = options.clone();
                tasks.push(
                    async move {
                        let _permit = semaphore.acquire_owned().await;
                        let task_email = email.clone();
                        let handle = tokio::spawn(async move {
                            validator.validate(&task_email, &opts).await
                        });
                        (idx, email, handle.await)
                    }
                    .boxed(),
                );
            }

            while let Some((idx, email, joined)) = tasks.next().await {
                match joined {
                    Ok(result) => {
                        if options.enable_cache {
                            self.validator.caches().bulk.insert(&email, result.clone());
                        }
                        slots[idx] = Some(result);
                    }
                    Err(err) => {
                        warn!(email = %email, %err, "validation task failed");
                        let reason = format!("validation crashed: {err}");
                        errors.push(BulkError {
                            email: email.clone(),
                            reason: reason.clone(),
                        });
                        slots[idx] = Some(error_result(&email, reason));
                    }
                }
            }

            if chunk_end < unique.len() && !chunk_delay.is_zero() {
                tokio::time::sleep(chunk_delay).await;
            }
        }

        let results: Vec<ValidationResult> = slots
            .into_iter()
            .zip(unique.iter())
            .map(|(slot, email)| {
                slot.unwrap_or_else(|| error_result(email, "validation produced no result".into()))
            })
            .collect();

        let summary = summarize(&results);
        let processed = results.len();

        BulkReport {
            total,
            processed,
            duplicates_removed,
            results,
            errors,
            validation_time_ms: started.elapsed().as_millis() as u64,
            summary,
        }
    }
}

/// Keep the first occurrence of each address; comparison is
/// case-insensitive on the trimmed input.
fn deduplicate(emails: &[String], enabled: bool) -> Vec<String> {
    if !enabled {
        return emails.iter().map(|e| e.trim().to_string()).collect();
    }
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(emails.len());
    for email in emails {
        let trimmed = email.trim();
        if seen.insert(trimmed.to_lowercase()) {
            unique.push(trimmed.to_string());
        }
    }
    unique
}

fn error_result(email: &str, reason: String) -> ValidationResult {
    let mut result = ValidationResult::new(email);
    result.status = ValidationStatus::Error;
    result.reason = reason;
    result
}

fn status_key(status: ValidationStatus) -> &'static str {
    match status {
        ValidationStatus::Valid => "valid",
        ValidationStatus::Risky => "risky",
        ValidationStatus::Invalid => "invalid",
        ValidationStatus::Error => "error",
    }
}

fn summarize(results: &[ValidationResult]) -> BulkSummary {
    let mut status_breakdown: BTreeMap<String, usize> = BTreeMap::new();
    let mut domain_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut disposable_count = 0;
    let mut typo_count = 0;
    let mut score_sum: u64 = 0;

    for result in results {
        *status_breakdown
            .entry(status_key(result.status).to_string())
            .or_default() += 1;
        if result.disposable {
            disposable_count += 1;
        }
        if result.typo_detected {
            typo_count += 1;
        }
        score_sum += u64::from(result.score);

        if let Some((_, domain)) = result.email.rsplit_once('@') {
            *domain_counts.entry(domain.to_lowercase()).or_default() += 1;
        }
        if !result.reason.is_empty() {
            *reason_counts.entry(result.reason.clone()).or_default() += 1;
        }
    }

    let average_score = if results.is_empty() {
        0.0
    } else {
        score_sum as f64 / results.len() as f64
    };

    let top_domains = top_counts(domain_counts, 10)
        .into_iter()
        .map(|(domain, count)| DomainCount { domain, count })
        .collect();
    let common_reasons = top_counts(reason_counts, 5)
        .into_iter()
        .map(|(reason, count)| ReasonCount { reason, count })
        .collect();

    let recommendations = build_recommendations(
        results.len(),
        disposable_count,
        typo_count,
        &status_breakdown,
    );

    BulkSummary {
        status_breakdown,
        disposable_count,
        typo_count,
        average_score,
        top_domains,
        common_reasons,
        recommendations,
    }
}

/// Sort by count descending, ties alphabetical, truncated to `limit`.
fn top_counts(counts: BTreeMap<String, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(limit);
    entries
}

fn build_recommendations(
    processed: usize,
    disposable_count: usize,
    typo_count: usize,
    status_breakdown: &BTreeMap<String, usize>,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    if processed == 0 {
        return recommendations;
    }

    let disposable_ratio = disposable_count as f64 / processed as f64;
    if disposable_ratio > DISPOSABLE_WARNING_RATIO {
        recommendations.push(format!(
            "{:.0}% of addresses use disposable providers; consider blocking disposable domains at signup",
            disposable_ratio * 100.0
        ));
    }

    let invalid = status_breakdown.get("invalid").copied().unwrap_or(0);
    let invalid_ratio = invalid as f64 / processed as f64;
    if invalid_ratio > INVALID_WARNING_RATIO {
        recommendations.push(format!(
            "{:.0}% of addresses are invalid; this list needs cleaning before sending",
            invalid_ratio * 100.0
        ));
    }

    if typo_count > 0 {
        recommendations.push(format!(
            "{typo_count} address(es) look like provider typos; offer the suggested corrections to users"
        ));
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineConfig, ValidationOptions};
    use pretty_assertions::assert_eq;

    fn bulk_validator() -> BulkValidator {
        let config = EngineConfig {
            disposable_list_path: None,
            bulk_chunk_delay_ms: 0,
            ..EngineConfig::default()
        };
        let validator = Arc::new(EmailValidator::new(config).expect("engine construction"));
        BulkValidator::new(validator)
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

    fn batch(inputs: &[&str]) -> Vec<String> {
        inputs.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn dedup_counts_and_breakdown() {
        let bulk = bulk_validator();
        let report = bulk
            .validate_batch(
                &batch(&["x@y.com", "X@Y.com", "bad"]),
                &offline_options(),
            )
            .await;

        assert_eq!(report.total, 3);
        assert_eq!(report.processed, 2);
        assert_eq!(report.duplicates_removed, 1);
        assert!(report.errors.is_empty());
        assert_eq!(report.results[0].email, "x@y.com");
        assert_eq!(report.results[1].email, "bad");

        let breakdown_sum: usize = report.summary.status_breakdown.values().sum();
        assert_eq!(breakdown_sum, report.processed);
    }

    #[tokio::test]
    async fn input_order_is_preserved_without_dedup() {
        let bulk = bulk_validator();
        let inputs = batch(&["c@z.com", "a@z.com", "c@z.com", "b@z.com"]);
        let options = ValidationOptions {
            deduplicate: false,
            ..offline_options()
        };
        let report = bulk.validate_batch(&inputs, &options).await;

        assert_eq!(report.processed, 4);
        assert_eq!(report.duplicates_removed, 0);
        for (result, input) in report.results.iter().zip(inputs.iter()) {
            assert_eq!(&result.email, input);
        }
    }

    #[tokio::test]
    async fn small_chunks_still_cover_the_batch() {
        let bulk = bulk_validator();
        let inputs = batch(&["a@z.com", "b@z.com", "c@z.com", "d@z.com", "e@z.com"]);
        let options = ValidationOptions {
            batch_size: 2,
            ..offline_options()
        };
        let report = bulk.validate_batch(&inputs, &options).await;

        assert_eq!(report.processed, 5);
        for (result, input) in report.results.iter().zip(inputs.iter()) {
            assert_eq!(&result.email, input);
        }
    }

    #[tokio::test]
    async fn disposable_share_triggers_a_recommendation() {
        let bulk = bulk_validator();
        let report = bulk
            .validate_batch(
                &batch(&["a@10minutemail.com", "b@mailinator.com", "c@example.com"]),
                &offline_options(),
            )
            .await;

        assert_eq!(report.summary.disposable_count, 2);
        assert!(report
            .summary
            .recommendations
            .iter()
            .any(|r| r.contains("disposable")));
    }

    #[tokio::test]
    async fn typos_are_counted_and_recommended() {
        let bulk = bulk_validator();
        let report = bulk
            .validate_batch(&batch(&["user@gmai.com", "ok@example.com"]), &offline_options())
            .await;

        assert_eq!(report.summary.typo_count, 1);
        assert!(report
            .summary
            .recommendations
            .iter()
            .any(|r| r.contains("typos")));
    }

    #[tokio::test]
    async fn top_domains_are_ranked() {
        let bulk = bulk_validator();
        let report = bulk
            .validate_batch(
                &batch(&["a@z.com", "b@z.com", "c@w.com", "bad-input"]),
                &offline_options(),
            )
            .await;

        let top = &report.summary.top_domains;
        assert_eq!(top[0].domain, "z.com");
        assert_eq!(top[0].count, 2);
        assert_eq!(top[1].domain, "w.com");
        // "bad-input" has no domain and is not counted.
        assert_eq!(top.len(), 2);
    }

    #[tokio::test]
    async fn repeat_batches_hit_the_bulk_cache() {
        let bulk = bulk_validator();
        let inputs = batch(&["user@gmai.com"]);
        let options = offline_options();

        let first = bulk.validate_batch(&inputs, &options).await;
        let second = bulk.validate_batch(&inputs, &options).await;

        assert_eq!(first.results[0].status, second.results[0].status);
        assert_eq!(first.results[0].score, second.results[0].score);
        assert_eq!(first.results[0].suggestion, second.results[0].suggestion);
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_report() {
        let bulk = bulk_validator();
        let report = bulk.validate_batch(&[], &offline_options()).await;

        assert_eq!(report.total, 0);
        assert_eq!(report.processed, 0);
        assert!(report.results.is_empty());
        assert!(report.summary.recommendations.is_empty());
        assert_eq!(report.summary.average_score, 0.0);
    }

    #[test]
    fn deduplication_is_case_insensitive_and_keeps_first() {
        let inputs = batch(&["A@B.com", " a@b.com ", "c@d.com"]);
        let unique = deduplicate(&inputs, true);
        assert_eq!(unique, vec!["A@B.com".to_string(), "c@d.com".to_string()]);

        let all = deduplicate(&inputs, false);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn top_counts_orders_by_frequency_then_name() {
        let mut counts = BTreeMap::new();
        counts.insert("b.com".to_string(), 2);
        counts.insert("a.com".to_string(), 2);
        counts.insert("c.com".to_string(), 5);
        let top = top_counts(counts, 2);
        assert_eq!(top[0].0, "c.com");
        assert_eq!(top[1].0, "a.com");
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn error_results_carry_the_reason() {
        let result = error_result("x@y.com", "boom".to_string());
        assert_eq!(result.status, ValidationStatus::Error);
        assert_eq!(result.reason, "boom");
        assert_eq!(result.email, "x@y.com");
    }
}

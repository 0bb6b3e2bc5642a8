//! Verdict scoring.
//!
//! Both functions here are pure: they read the result record and nothing
//! else, so re-running them over the same record always yields the same
//! value. The coordinator derives `score` exclusively through
//! [`compute_score`].

use crate::{SmtpDeliverability, ValidationResult};

/// Score at or above which an address is classified `valid`.
pub const VALID_THRESHOLD: u8 = 85;
pub const STRICT_VALID_THRESHOLD: u8 = 90;
/// Score at or above which an address is classified `risky` rather than
/// `invalid`.
pub const RISKY_THRESHOLD: u8 = 65;
pub const STRICT_RISKY_THRESHOLD: u8 = 70;

pub fn valid_threshold(strict: bool) -> u8 {
    if strict {
        STRICT_VALID_THRESHOLD
    } else {
        VALID_THRESHOLD
    }
}

pub fn risky_threshold(strict: bool) -> u8 {
    if strict {
        STRICT_RISKY_THRESHOLD
    } else {
        RISKY_THRESHOLD
    }
}

/// Weighted confidence score in [0, 100] for a fully populated result.
pub fn compute_score(result: &ValidationResult, strict: bool) -> u8 {
    let mut score: i32 = 0;

    if result.syntax_valid {
        score += 25;
    }
    if result.domain_valid {
        score += 20;
    }
    if result.mx_found {
        score += 25;
    }

    score += match result.smtp_deliverable {
        SmtpDeliverability::Yes => 20,
        SmtpDeliverability::Unknown => 5,
        SmtpDeliverability::No => 0,
    };

    if let Some(health) = &result.domain_health {
        if health.spf {
            score += 5;
        }
        if health.dmarc {
            score += 7;
        }
        if health.dkim {
            score += 3;
        }
        if health.blacklisted {
            score -= if strict { 60 } else { 50 };
        }
        // Reputation pulls the score toward the domain's standing.
        score += (i32::from(health.reputation) - 50) / 5;
    }

    if result.disposable {
        score -= if strict { 50 } else { 40 };
    }
    if result.is_role_based {
        score -= if strict { 25 } else { 15 };
    }
    if result.is_free_provider {
        score -= if strict { 10 } else { 5 };
    }
    if result.typo_detected && result.suggestion.is_some() {
        score -= if strict { 25 } else { 15 };
    }

    if result.tls_supported {
        score += 5;
    }
    if is_business_email(result) {
        score += 10;
    }

    score.clamp(0, 100) as u8
}

/// A deliverable custom-domain mailbox, as opposed to a consumer or
/// throwaway one.
pub fn is_business_email(result: &ValidationResult) -> bool {
    result.mx_found && !result.is_free_provider && !result.disposable
}

/// Reputation of the address itself in [0, 100], independent of delivery.
///
/// 50 base, penalized for automation markers in the local part, plus half
/// the signed delta of the domain's reputation from neutral.
pub fn address_reputation(local: &str, domain_reputation: u8) -> u8 {
    let mut reputation: i32 = 50;
    let lowered = local.to_lowercase();

    if lowered.contains("noreply") || lowered.contains("no-reply") {
        reputation -= 20;
    } else if lowered.contains("test") || lowered.contains("demo") {
        reputation -= 15;
    }

    if has_digit_run(&lowered, 5) {
        reputation -= 10;
    }
    if local.len() < 3 {
        reputation -= 10;
    }
    if local.len() > 20 {
        reputation -= 5;
    }

    reputation += (i32::from(domain_reputation) - 50) / 2;

    reputation.clamp(0, 100) as u8
}

fn has_digit_run(s: &str, min_len: usize) -> bool {
    let mut run = 0;
    for c in s.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= min_len {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DomainHealth, ValidationStatus};
    use pretty_assertions::assert_eq;

    fn healthy_result() -> ValidationResult {
        let mut result = ValidationResult::new("john.doe@gmail.com");
        result.syntax_valid = true;
        result.domain_valid = true;
        result.mx_found = true;
        result.smtp_deliverable = SmtpDeliverability::Yes;
        result.is_free_provider = true;
        result.tls_supported = true;
        result.domain_health = Some(DomainHealth {
            spf: true,
            dkim: false,
            dmarc: true,
            blacklisted: false,
            reputation: 100,
        });
        result
    }

    #[test]
    fn healthy_mailbox_clears_the_valid_threshold() {
        let result = healthy_result();
        let score = compute_score(&result, false);
        assert!(score >= VALID_THRESHOLD, "score was {score}");
    }

    #[test]
    fn scoring_is_pure() {
        let result = healthy_result();
        assert_eq!(compute_score(&result, false), compute_score(&result, false));
        assert_eq!(compute_score(&result, true), compute_score(&result, true));
    }

    #[test]
    fn disposable_penalty_drops_below_valid() {
        let mut result = healthy_result();
        result.disposable = true;
        let score = compute_score(&result, false);
        assert!(score < VALID_THRESHOLD, "score was {score}");
    }

    #[test]
    fn strict_mode_penalizes_harder() {
        let mut result = healthy_result();
        result.disposable = true;
        assert!(compute_score(&result, true) < compute_score(&result, false));

        let mut role = healthy_result();
        role.is_role_based = true;
        assert!(compute_score(&role, true) < compute_score(&role, false));
    }

    #[test]
    fn blacklisting_is_the_largest_penalty() {
        let mut result = healthy_result();
        if let Some(health) = result.domain_health.as_mut() {
            health.blacklisted = true;
        }
        let score = compute_score(&result, false);
        assert!(score < RISKY_THRESHOLD, "score was {score}");
    }

    #[test]
    fn typo_penalty_requires_a_suggestion() {
        let mut flagged_only = healthy_result();
        flagged_only.typo_detected = true;
        flagged_only.suggestion = None;

        let mut with_suggestion = healthy_result();
        with_suggestion.typo_detected = true;
        with_suggestion.suggestion = Some("john.doe@gmail.com".to_string());

        assert!(
            compute_score(&with_suggestion, false) < compute_score(&flagged_only, false)
        );
    }

    #[test]
    fn smtp_unknown_scores_between_yes_and_no() {
        let yes = healthy_result();
        let mut unknown = healthy_result();
        unknown.smtp_deliverable = SmtpDeliverability::Unknown;
        let mut no = healthy_result();
        no.smtp_deliverable = SmtpDeliverability::No;

        let yes_score = compute_score(&yes, false);
        let unknown_score = compute_score(&unknown, false);
        let no_score = compute_score(&no, false);
        assert!(yes_score > unknown_score);
        assert!(unknown_score > no_score);
    }

    #[test]
    fn business_email_detection() {
        let mut result = ValidationResult::new("buyer@acme.example");
        result.mx_found = true;
        assert!(is_business_email(&result));

        result.is_free_provider = true;
        assert!(!is_business_email(&result));

        result.is_free_provider = false;
        result.disposable = true;
        assert!(!is_business_email(&result));
    }

    #[test]
    fn unparsed_address_scores_zero() {
        let mut result = ValidationResult::new("garbage");
        result.status = ValidationStatus::Invalid;
        assert_eq!(compute_score(&result, false), 0);
    }

    #[test]
    fn address_reputation_penalties() {
        assert_eq!(address_reputation("john.doe", 50), 50);
        assert_eq!(address_reputation("noreply", 50), 30);
        assert_eq!(address_reputation("no-reply", 50), 30);
        assert_eq!(address_reputation("testuser", 50), 35);
        assert_eq!(address_reputation("user12345", 50), 40);
        assert_eq!(address_reputation("ab", 50), 40);
        assert_eq!(address_reputation("a-very-long-local-part", 50), 45);
    }

    #[test]
    fn address_reputation_tracks_domain_reputation() {
        assert_eq!(address_reputation("john.doe", 100), 75);
        assert_eq!(address_reputation("john.doe", 0), 25);
    }

    #[test]
    fn digit_run_detection() {
        assert!(has_digit_run("user12345", 5));
        assert!(!has_digit_run("user1234", 5));
        assert!(!has_digit_run("u1s2e3r45", 5));
    }

    #[test]
    fn thresholds_by_mode() {
        assert_eq!(valid_threshold(false), 85);
        assert_eq!(valid_threshold(true), 90);
        assert_eq!(risky_threshold(false), 65);
        assert_eq!(risky_threshold(true), 70);
    }
}

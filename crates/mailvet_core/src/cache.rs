//! Keyed TTL caches shared across validation stages.
//!
//! One generic store parameterized by value type; each stage owns a
//! namespace with its own default TTL. Entries carry a monotonic expiry
//! and are never mutated in place: a refresh is a new insert.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

/// TTL for DNS-backed namespaces (domain, mx, health).
pub const DNS_TTL: Duration = Duration::from_secs(5 * 60);
/// TTL for disposable-domain classifications.
pub const DISPOSABLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// TTL for typo-corrector reports.
pub const TYPO_TTL: Duration = Duration::from_secs(60 * 60);
/// TTL for complete bulk validation results.
pub const BULK_TTL: Duration = Duration::from_secs(30 * 60);

/// Map size above which inserts opportunistically purge expired entries.
const PURGE_THRESHOLD: usize = 1_024;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A thread-safe map whose entries expire after a per-entry TTL.
///
/// Reads take a shared lock; the exclusive section is limited to inserts
/// and clears, which are rare relative to lookups.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Look up `key`, returning `None` for missing or expired entries.
    ///
    /// Expired entries are left in place and reclaimed by a later insert,
    /// keeping the read path free of write locks.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        if let Ok(mut entries) = self.entries.write() {
            if entries.len() >= PURGE_THRESHOLD {
                let before = entries.len();
                entries.retain(|_, entry| entry.expires_at > now);
                debug!(purged = before - entries.len(), "purged expired cache entries");
            }
            entries.insert(
                key.into(),
                Entry {
                    value,
                    expires_at: now + ttl,
                },
            );
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The five cache namespaces used by the pipeline and bulk scheduler.
pub struct ValidationCaches {
    pub domain: TtlCache<crate::dns::DomainResolution>,
    pub mx: TtlCache<crate::dns::MxResolution>,
    pub health: TtlCache<crate::DomainHealth>,
    pub disposable: TtlCache<bool>,
    pub typo: TtlCache<crate::typo::TypoReport>,
    pub bulk: TtlCache<crate::ValidationResult>,
}

impl ValidationCaches {
    pub fn new() -> Self {
        Self {
            domain: TtlCache::new(DNS_TTL),
            mx: TtlCache::new(DNS_TTL),
            health: TtlCache::new(DNS_TTL),
            disposable: TtlCache::new(DISPOSABLE_TTL),
            typo: TtlCache::new(TYPO_TTL),
            bulk: TtlCache::new(BULK_TTL),
        }
    }

    pub fn clear_all(&self) {
        self.domain.clear();
        self.mx.clear();
        self.health.clear();
        self.disposable.clear();
        self.typo.clear();
        self.bulk.clear();
    }

    /// Total entry count across all namespaces.
    pub fn total_entries(&self) -> usize {
        self.domain.len()
            + self.mx.len()
            + self.health.len()
            + self.disposable.len()
            + self.typo.len()
            + self.bulk.len()
    }
}

impl Default for ValidationCaches {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_then_get_round_trips() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("example.com", 42);
        assert_eq!(cache.get("example.com"), Some(42));
        assert_eq!(cache.get("other.com"), None);
    }

    #[test]
    fn expired_entries_are_invisible() {
        let cache: TtlCache<&'static str> = TtlCache::new(Duration::from_secs(60));
        cache.insert_with_ttl("short", "value", Duration::from_millis(0));
        assert_eq!(cache.get("short"), None);
    }

    #[test]
    fn refresh_replaces_the_expired_entry() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert_with_ttl("k", 1, Duration::from_millis(0));
        assert_eq!(cache.get("k"), None);
        cache.insert("k", 2);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_empties_the_namespace() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn caches_clear_all_namespaces() {
        let caches = ValidationCaches::new();
        caches.disposable.insert("tempmail.example", true);
        caches.typo.insert(
            "user@gmai.com",
            crate::typo::TypoReport {
                typo_detected: true,
                suggestion: Some("user@gmail.com".to_string()),
                issues: Vec::new(),
                confidence: 95,
            },
        );
        assert_eq!(caches.total_entries(), 2);
        caches.clear_all();
        assert_eq!(caches.total_entries(), 0);
    }
}

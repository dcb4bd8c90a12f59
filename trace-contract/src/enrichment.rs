//! Display-only enrichment of claims by stable identifier.
//!
//! Annotations are looked up through an injected `AnnotationSource` and
//! memoized in an explicit per-instance `EnrichmentCache` (TTL plus
//! least-recently-used eviction). The enricher only reads the view model;
//! its output is a separate map that never feeds back into epistemic
//! fields.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EnrichmentConfig;
use crate::errors::Result;
use crate::view_model::ViewModel;

/// Supplementary display data for one stable identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Identifier as cited by the claim (`doi:...`, `pmid:...`).
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// External lookup service. `Ok(None)` means "known to have nothing".
pub trait AnnotationSource {
    fn fetch(&self, key: &str) -> Result<Option<Annotation>>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Option<Annotation>,
    inserted_at: DateTime<Utc>,
    last_used: u64,
}

/// Bounded TTL cache for annotation lookups. Negative results are cached.
#[derive(Debug, Clone)]
pub struct EnrichmentCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<String, CacheEntry>,
    tick: u64,
}

impl EnrichmentCache {
    /// `max_entries` below 1 is raised to 1.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
            tick: 0,
        }
    }

    pub fn from_config(cfg: &EnrichmentConfig) -> Self {
        let ttl = i64::try_from(cfg.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self::new(ttl, cfg.max_entries)
    }

    /// Cached lookup. Outer `None` is a miss (absent or expired);
    /// `Some(None)` is a cached negative result.
    pub fn get(&mut self, key: &str, now: DateTime<Utc>) -> Option<Option<Annotation>> {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| self.is_expired(entry, now));
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.get_mut(key)?;
        entry.last_used = tick;
        Some(entry.value.clone())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<Annotation>, now: DateTime<Utc>) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_lru();
        }
        self.tick += 1;
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                last_used: self.tick,
            },
        );
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.signed_duration_since(entry.inserted_at) < ttl);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.inserted_at) >= self.ttl
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            tracing::debug!(key = key.as_str(), "Evicting least-recently-used annotation");
            self.entries.remove(&key);
        }
    }
}

/// Looks up annotations for the stable identifiers cited by a view model.
pub struct Enricher<S: AnnotationSource> {
    source: S,
    cache: EnrichmentCache,
}

impl<S: AnnotationSource> Enricher<S> {
    pub fn new(source: S, cache: EnrichmentCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &EnrichmentCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut EnrichmentCache {
        &mut self.cache
    }

    /// Annotations keyed by stable identifier. Failed lookups are logged
    /// and skipped, never cached.
    pub fn annotate(&mut self, vm: &ViewModel, now: DateTime<Utc>) -> BTreeMap<String, Annotation> {
        let mut out = BTreeMap::new();
        for key in vm.claims.iter().flat_map(|claim| claim.stable_refs()) {
            if out.contains_key(&key) {
                continue;
            }
            let found = match self.cache.get(&key, now) {
                Some(hit) => hit,
                None => match self.source.fetch(&key) {
                    Ok(fetched) => {
                        self.cache.insert(key.clone(), fetched.clone(), now);
                        fetched
                    }
                    Err(e) => {
                        tracing::warn!(key = key.as_str(), error = %e, "Annotation lookup failed");
                        continue;
                    }
                },
            };
            if let Some(annotation) = found {
                out.insert(key, annotation);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::adapt;
    use crate::errors::TraceContractError;
    use serde_json::json;
    use std::cell::RefCell;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    fn annotation(key: &str) -> Annotation {
        Annotation {
            key: key.to_string(),
            title: Some(format!("Title for {key}")),
            summary: None,
            url: None,
        }
    }

    #[derive(Default)]
    struct CountingSource {
        calls: RefCell<Vec<String>>,
    }

    impl AnnotationSource for CountingSource {
        fn fetch(&self, key: &str) -> Result<Option<Annotation>> {
            self.calls.borrow_mut().push(key.to_string());
            match key {
                "pmid:404" => Ok(None),
                "doi:broken" => Err(TraceContractError::enrichment("upstream unavailable")),
                other => Ok(Some(annotation(other))),
            }
        }
    }

    #[test]
    fn test_cache_ttl_expiry() {
        let mut cache = EnrichmentCache::new(Duration::seconds(60), 4);
        cache.insert("doi:a", Some(annotation("doi:a")), t0());
        assert!(cache.get("doi:a", t0() + Duration::seconds(59)).is_some());
        assert!(cache.get("doi:a", t0() + Duration::seconds(60)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_negative_result() {
        let mut cache = EnrichmentCache::new(Duration::seconds(60), 4);
        cache.insert("pmid:404", None, t0());
        assert_eq!(cache.get("pmid:404", t0()), Some(None));
    }

    #[test]
    fn test_cache_lru_eviction() {
        let mut cache = EnrichmentCache::new(Duration::seconds(600), 2);
        cache.insert("a", None, t0());
        cache.insert("b", None, t0());
        // Touch "a" so "b" becomes least recently used.
        assert!(cache.get("a", t0()).is_some());
        cache.insert("c", None, t0());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b", t0()).is_none());
        assert!(cache.get("a", t0()).is_some());
        assert!(cache.get("c", t0()).is_some());
    }

    #[test]
    fn test_purge_expired() {
        let mut cache = EnrichmentCache::new(Duration::seconds(10), 8);
        cache.insert("old", None, t0());
        cache.insert("new", None, t0() + Duration::seconds(8));
        assert_eq!(cache.purge_expired(t0() + Duration::seconds(12)), 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_from_config() {
        let cache = EnrichmentCache::from_config(&EnrichmentConfig {
            ttl_seconds: u64::MAX,
            max_entries: 0,
        });
        assert_eq!(cache.max_entries, 1);
        assert_eq!(cache.ttl, Duration::MAX);
    }

    #[test]
    fn test_annotate_is_display_only() {
        let raw = json!({
            "mode": "non_scientific_discourse",
            "claims": [
                {"id": "c-1", "evidence": [{"doi": "10.1/a"}, {"pmid": "404"}]},
                {"id": "c-2", "evidence": [{"doi": "10.1/a"}, {"doi": "broken"}]}
            ]
        });
        let vm = adapt(Some(&raw)).expect("view model");
        let before = vm.clone();

        let mut enricher = Enricher::new(
            CountingSource::default(),
            EnrichmentCache::new(Duration::seconds(60), 16),
        );
        let annotations = enricher.annotate(&vm, t0());
        assert_eq!(annotations.len(), 1);
        assert!(annotations.contains_key("doi:10.1/a"));
        assert_eq!(vm, before);

        // Failures are not cached; hits and negatives are.
        assert_eq!(enricher.cache().len(), 2);
        let second = enricher.annotate(&vm, t0() + Duration::seconds(1));
        assert_eq!(second, annotations);
        let calls = enricher.source.calls.borrow();
        assert_eq!(calls.iter().filter(|k| *k == "doi:10.1/a").count(), 1);
        assert_eq!(calls.iter().filter(|k| *k == "doi:broken").count(), 2);
    }
}

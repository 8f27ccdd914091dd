//! Flat response cache for GET requests.
//!
//! One key per path plus encoded query. There is no eviction; writes clear the
//! whole map when auto-invalidation is on.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Body and paging total of a cached GET response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub body: Value,
    pub total: Option<u64>,
}

/// Shared cache; clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CachedResponse>>,
    auto_invalidate: bool,
}

impl ResponseCache {
    #[must_use]
    pub fn new(auto_invalidate: bool) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            auto_invalidate,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: String, response: CachedResponse) {
        self.entries.insert(key, response);
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn auto_invalidate(&self) -> bool {
        self.auto_invalidate
    }

    /// Called after a successful write.
    pub(crate) fn on_write(&self) {
        if self.auto_invalidate && !self.entries.is_empty() {
            tracing::debug!(entries = self.entries.len(), "clearing response cache after write");
            self.entries.clear();
        }
    }
}

/// Cache key for a path and its query pairs, in order.
#[must_use]
pub fn cache_key(path: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return path.to_owned();
    }
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter())
        .finish();
    format!("{path}?{encoded}")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn cached(id: u64) -> CachedResponse {
        CachedResponse {
            body: json!({ "story": { "id": id } }),
            total: None,
        }
    }

    #[test]
    fn key_includes_encoded_query() {
        assert_eq!(cache_key("/1/stories", &[]), "/1/stories");
        let query = vec![
            ("with_slug".to_owned(), "blog/a b".to_owned()),
            ("page".to_owned(), "2".to_owned()),
        ];
        assert_eq!(
            cache_key("/1/stories", &query),
            "/1/stories?with_slug=blog%2Fa+b&page=2"
        );
    }

    #[test]
    fn clones_share_entries() {
        let cache = ResponseCache::new(true);
        let clone = cache.clone();
        cache.insert("/1/stories/7".to_owned(), cached(7));
        assert_eq!(clone.get("/1/stories/7"), Some(cached(7)));
        assert!(clone.invalidate("/1/stories/7"));
        assert!(cache.is_empty());
        assert!(!cache.invalidate("/1/stories/7"));
    }

    #[test]
    fn writes_clear_only_with_auto_invalidate() {
        let auto = ResponseCache::new(true);
        auto.insert("a".to_owned(), cached(1));
        auto.on_write();
        assert!(auto.is_empty());

        let manual = ResponseCache::new(false);
        manual.insert("a".to_owned(), cached(1));
        manual.on_write();
        assert_eq!(manual.len(), 1);
        manual.clear();
        assert!(manual.is_empty());
    }
}

use super::{CacheEntry, CacheKey};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// In-memory tier (spec §4.5 tier 1): exact-key lookup only, LRU eviction.
pub struct MemoryCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.lock().unwrap().put(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> CacheKey {
        CacheKey {
            normalized_text: text.to_string(),
            target_language: "fr".to_string(),
            model_identifier: "gpt-4o-mini".to_string(),
        }
    }

    fn entry(translated: &str) -> CacheEntry {
        CacheEntry {
            translated_text: translated.to_string(),
            embedding: vec![],
            quality_score: 1.0,
            timestamp: 0,
        }
    }

    #[test]
    fn exact_key_roundtrips() {
        let cache = MemoryCache::new(4);
        cache.put(key("hello"), entry("bonjour"));
        assert_eq!(cache.get(&key("hello")).unwrap().translated_text, "bonjour");
        assert!(cache.get(&key("goodbye")).is_none());
    }

    #[test]
    fn evicts_least_recently_used_over_capacity() {
        let cache = MemoryCache::new(2);
        cache.put(key("a"), entry("A"));
        cache.put(key("b"), entry("B"));
        cache.put(key("c"), entry("C"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_none());
    }
}

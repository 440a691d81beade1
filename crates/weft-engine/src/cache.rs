//! Rendered-fragment cache for `$PC:{…}:PC$` blocks.
//!
//! Provides [`FragmentKey`] for content-based cache keys and the
//! process-scoped [`FragmentCache`] owned by the [`Engine`](crate::Engine).

use std::collections::HashMap;
use std::sync::RwLock;

use sha2::{Digest, Sha256};

/// Inputs that determine a partial-cache entry.
#[derive(Debug)]
pub struct FragmentKey<'a> {
    /// Caller-chosen scope separating otherwise identical blocks
    /// (for example a language or a page path).
    pub scope: &'a str,
    /// Raw block content.
    pub content: &'a str,
}

impl FragmentKey<'_> {
    /// SHA-256 of `"{scope}:{content}"`, hex encoded.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.scope.as_bytes());
        hasher.update(b":");
        hasher.update(self.content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// In-memory store of rendered fragments.
///
/// A disabled cache never stores anything and every lookup misses.
#[derive(Debug)]
pub struct FragmentCache {
    enabled: bool,
    entries: RwLock<HashMap<String, String>>,
}

impl Default for FragmentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache that always misses.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &FragmentKey<'_>) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.entries
            .read()
            .unwrap()
            .get(&key.compute_hash())
            .cloned()
    }

    pub fn set(&self, key: &FragmentKey<'_>, fragment: String) {
        if !self.enabled {
            return;
        }
        self.entries
            .write()
            .unwrap()
            .insert(key.compute_hash(), fragment);
    }

    /// Drop every stored fragment.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_key_hash() {
        let key1 = FragmentKey { scope: "en", content: "PC:{a}:PC" };
        let key2 = FragmentKey { scope: "en", content: "PC:{a}:PC" };
        let key3 = FragmentKey { scope: "de", content: "PC:{a}:PC" };

        assert_eq!(key1.compute_hash(), key2.compute_hash());
        assert_ne!(key1.compute_hash(), key3.compute_hash());
        assert_eq!(key1.compute_hash().len(), 64);
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = FragmentCache::new();
        let key = FragmentKey { scope: "", content: "x" };

        assert_eq!(cache.get(&key), None);
        cache.set(&key, "rendered".to_owned());
        assert_eq!(cache.get(&key).as_deref(), Some("rendered"));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_cache_always_misses() {
        let cache = FragmentCache::disabled();
        let key = FragmentKey { scope: "", content: "x" };

        cache.set(&key, "rendered".to_owned());
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
    }
}

//! # Cache Group
//!
//! Routes each key to one of several child caches by key prefix. The group
//! is immutable after construction; concurrency comes from the children.

use crate::cache::{Cache, MemoryCache};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How a key is matched against the configured prefixes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixMatch {
    /// First child whose configured prefix starts with the key.
    ///
    /// This is the historical rule. It is almost certainly inverted: a key
    /// longer than every prefix (`user:42` against `user:`) selects nothing,
    /// while a short key (`u`) selects the first prefix beginning with it.
    #[default]
    PrefixStartsWithKey,
    /// Child whose prefix is the longest prefix of the key; ties go to the
    /// child configured first.
    KeyStartsWithPrefix,
}

/// Prefix-routed set of caches
pub struct CacheGroup<V> {
    caches: Vec<(String, Arc<dyn Cache<V>>)>,
    prefix_match: PrefixMatch,
    /// TTL used by [`CacheGroup::set_default`]
    default_ttl: Duration,
}

impl<V> CacheGroup<V> {
    /// Create a group using [`PrefixMatch::PrefixStartsWithKey`]
    #[must_use]
    pub fn new(caches: Vec<(String, Arc<dyn Cache<V>>)>) -> Self {
        Self {
            caches,
            prefix_match: PrefixMatch::default(),
            default_ttl: Duration::ZERO,
        }
    }

    /// Select the matching rule
    #[must_use]
    pub fn with_prefix_match(mut self, prefix_match: PrefixMatch) -> Self {
        self.prefix_match = prefix_match;
        self
    }

    /// TTL applied by [`CacheGroup::set_default`]; zero never expires
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Configured default TTL
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `value` with the group's default TTL
    ///
    /// # Errors
    ///
    /// As [`Cache::set`] on the selected child, or `Error::NoCacheForKey`.
    pub fn set_default(&self, key: &str, value: V) -> Result<()> {
        self.require(key)?.set(key, value, self.default_ttl)
    }

    /// The child responsible for `key`, if any
    #[must_use]
    pub fn get_cache(&self, key: &str) -> Option<&Arc<dyn Cache<V>>> {
        match self.prefix_match {
            PrefixMatch::PrefixStartsWithKey => self
                .caches
                .iter()
                .find(|(prefix, _)| prefix.starts_with(key))
                .map(|(_, cache)| cache),
            PrefixMatch::KeyStartsWithPrefix => {
                let mut best: Option<&(String, Arc<dyn Cache<V>>)> = None;
                for candidate in self.caches.iter().filter(|(p, _)| key.starts_with(p.as_str())) {
                    if best.map_or(true, |(p, _)| candidate.0.len() > p.len()) {
                        best = Some(candidate);
                    }
                }
                best.map(|(_, cache)| cache)
            }
        }
    }

    /// Configured prefixes, in order
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.caches.iter().map(|(prefix, _)| prefix.as_str())
    }

    fn require(&self, key: &str) -> Result<&Arc<dyn Cache<V>>> {
        self.get_cache(key).ok_or_else(|| Error::NoCacheForKey {
            key: key.to_string(),
        })
    }
}

impl<V> CacheGroup<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// One [`MemoryCache`] per configured prefix
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        let caches = config
            .groups
            .iter()
            .map(|prefix| {
                let cache: Arc<dyn Cache<V>> = Arc::new(MemoryCache::new());
                (prefix.clone(), cache)
            })
            .collect();
        Self::new(caches)
            .with_prefix_match(config.prefix_match)
            .with_default_ttl(config.default_ttl())
    }
}

impl<V> Cache<V> for CacheGroup<V>
where
    V: Send + Sync,
{
    fn get(&self, key: &str) -> Option<V> {
        self.get_cache(key)?.get(key)
    }

    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.require(key)?.set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.require(key)?.delete(key)
    }

    fn is_exist(&self, key: &str) -> bool {
        self.get_cache(key).is_some_and(|cache| cache.is_exist(key))
    }

    fn count(&self) -> usize {
        self.caches.iter().map(|(_, cache)| cache.count()).sum()
    }

    /// Children are not enumerated
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn clear(&self) -> Result<()> {
        for (_, cache) in &self.caches {
            cache.clear()?;
        }
        Ok(())
    }
}

impl<V> std::fmt::Debug for CacheGroup<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheGroup")
            .field("prefixes", &self.prefixes().collect::<Vec<_>>())
            .field("prefix_match", &self.prefix_match)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MINUTE: Duration = Duration::from_secs(60);

    fn group(prefixes: &[&str]) -> CacheGroup<u32> {
        CacheGroup::new(
            prefixes
                .iter()
                .map(|p| {
                    let cache: Arc<dyn Cache<u32>> = Arc::new(MemoryCache::new());
                    ((*p).to_string(), cache)
                })
                .collect(),
        )
    }

    #[test]
    fn test_default_rule_matches_configured_prefix_against_key() {
        let group = group(&["user:", "session:"]);
        // The configured prefix must start with the key
        assert!(group.get_cache("user:").is_some());
        assert!(group.get_cache("sess").is_some());
        // A full key longer than its prefix is not routed
        assert!(group.get_cache("user:42").is_none());
    }

    #[test]
    fn test_default_rule_first_match_wins() {
        let group = group(&["ab", "abc"]);
        group.set("a", 1, MINUTE).unwrap();
        let first = group.get_cache("a").unwrap();
        assert_eq!(first.get("a"), Some(1));
        assert_eq!(group.caches[1].1.get("a"), None);
    }

    #[test]
    fn test_key_starts_with_prefix_picks_longest() {
        let group = group(&["user:", "user:admin:", "session:"])
            .with_prefix_match(PrefixMatch::KeyStartsWithPrefix);

        group.set("user:admin:1", 7, MINUTE).unwrap();
        group.set("user:42", 8, MINUTE).unwrap();

        assert_eq!(group.caches[1].1.get("user:admin:1"), Some(7));
        assert_eq!(group.caches[0].1.get("user:42"), Some(8));
        assert_eq!(group.get("user:42"), Some(8));
        assert!(group.is_exist("user:admin:1"));
        assert!(group.get_cache("other").is_none());
    }

    #[test]
    fn test_unrouted_key() {
        let group = group(&["user:"]).with_prefix_match(PrefixMatch::KeyStartsWithPrefix);
        assert_eq!(group.get("cart:1"), None);
        assert!(!group.is_exist("cart:1"));
        assert!(matches!(
            group.set("cart:1", 1, MINUTE),
            Err(Error::NoCacheForKey { .. })
        ));
        assert!(group.delete("cart:1").is_err());
    }

    #[test]
    fn test_count_sums_children_and_keys_is_empty() {
        let group = group(&["a", "b"]).with_prefix_match(PrefixMatch::KeyStartsWithPrefix);
        group.set("a1", 1, MINUTE).unwrap();
        group.set("b1", 2, MINUTE).unwrap();
        // Promote each child's shadow into its snapshot
        group.get("a-miss");
        group.get("b-miss");

        assert_eq!(group.count(), 2);
        assert!(group.keys().is_empty());
    }

    struct CountingClear(AtomicUsize);

    impl Cache<u32> for CountingClear {
        fn get(&self, _key: &str) -> Option<u32> {
            None
        }
        fn set(&self, _key: &str, _value: u32, _ttl: Duration) -> Result<()> {
            Ok(())
        }
        fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }
        fn count(&self) -> usize {
            0
        }
        fn keys(&self) -> Vec<String> {
            Vec::new()
        }
        fn clear(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_clear_reaches_every_child() {
        let a = Arc::new(CountingClear(AtomicUsize::new(0)));
        let b = Arc::new(CountingClear(AtomicUsize::new(0)));
        let group: CacheGroup<u32> = CacheGroup::new(vec![
            ("a".to_string(), a.clone() as Arc<dyn Cache<u32>>),
            ("b".to_string(), b.clone() as Arc<dyn Cache<u32>>),
        ]);
        group.clear().unwrap();
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig {
            default_ttl_secs: 120,
            groups: vec!["user:".into(), "page:".into()],
            prefix_match: PrefixMatch::KeyStartsWithPrefix,
        };
        let group: CacheGroup<String> = CacheGroup::from_config(&config);
        assert_eq!(group.prefixes().collect::<Vec<_>>(), vec!["user:", "page:"]);
        assert_eq!(group.default_ttl(), Duration::from_secs(120));
        group.set("page:/home", "html".into(), MINUTE).unwrap();
        assert_eq!(group.get("page:/home").as_deref(), Some("html"));
    }

    #[test]
    fn test_set_default_uses_configured_ttl() {
        let group = group(&["s:"])
            .with_prefix_match(PrefixMatch::KeyStartsWithPrefix)
            .with_default_ttl(Duration::from_millis(40));
        group.set_default("s:1", 1).unwrap();
        assert_eq!(group.get("s:1"), Some(1));

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(group.get("s:1"), None);
        assert!(matches!(
            group.set_default("other", 2),
            Err(Error::NoCacheForKey { .. })
        ));
    }

    #[test]
    fn test_zero_default_ttl_never_expires() {
        let group = group(&["s:"]).with_prefix_match(PrefixMatch::KeyStartsWithPrefix);
        assert!(group.default_ttl().is_zero());
        group.set_default("s:1", 1).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(group.get("s:1"), Some(1));
    }
}

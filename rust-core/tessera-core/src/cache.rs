//! # Expiring Memory Cache
//!
//! Concurrent key/value store with a per-entry TTL, tuned for read-mostly
//! workloads.
//!
//! ```text
//!            lock-free                          mutex
//!   ┌──────────────────────────┐     ┌──────────────────────────┐
//!   │ read: ArcSwap<ReadOnly>  │     │ dirty: Option<HashMap>   │
//!   │   map ──▶ Arc<Entry>  ◀──┼─────┼── map (superset of read) │
//!   │   amended: bool          │     │ misses: usize            │
//!   └──────────────────────────┘     └──────────────────────────┘
//! ```
//!
//! Keys already present in the snapshot are read and overwritten without
//! taking the lock: each [`Entry`] holds its state in an atomically swapped
//! slot. New keys go to the shadow map under the lock. Every lookup that
//! misses the snapshot but has to consult the shadow counts as a miss; once
//! the misses reach the shadow's size, the shadow becomes the new snapshot.
//!
//! An entry moves through `Live → Deleted → Expunged → Live`. `Expunged`
//! marks an entry that sits in the snapshot but was left out of the shadow
//! when the shadow was rebuilt; writing it again must re-add it to the shadow
//! under the lock first.
//!
//! Expiry is checked on read and never changes an entry's state.

use crate::error::Result;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Keyed store with per-call TTL
///
/// Implemented by [`MemoryCache`] and by [`CacheGroup`](crate::CacheGroup),
/// which routes keys to other caches.
pub trait Cache<V>: Send + Sync {
    /// Current value, or `None` if absent, deleted, or expired
    fn get(&self, key: &str) -> Option<V>;

    /// Store `value` for `ttl`; a zero `ttl` never expires
    ///
    /// # Errors
    ///
    /// Backend-specific; the memory cache never fails.
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()>;

    /// Remove `key` if present
    ///
    /// # Errors
    ///
    /// Backend-specific; the memory cache never fails.
    fn delete(&self, key: &str) -> Result<()>;

    /// Whether `get` would return a value
    fn is_exist(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Approximate number of entries
    fn count(&self) -> usize;

    /// Approximate key listing
    fn keys(&self) -> Vec<String>;

    /// Drop all entries, where the backend supports it
    ///
    /// # Errors
    ///
    /// Backend-specific.
    fn clear(&self) -> Result<()>;
}

enum Slot<V> {
    Live {
        value: V,
        expires_at: Option<Instant>,
    },
    Deleted,
    Expunged,
}

impl<V> Slot<V> {
    fn live(value: V, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        Self::Live { value, expires_at }
    }
}

struct Entry<V> {
    slot: ArcSwap<Slot<V>>,
}

impl<V: Clone> Entry<V> {
    fn new(slot: Arc<Slot<V>>) -> Self {
        Self {
            slot: ArcSwap::new(slot),
        }
    }

    fn load(&self) -> Option<V> {
        match &**self.slot.load() {
            Slot::Live { value, expires_at } => match expires_at {
                Some(at) if Instant::now() >= *at => None,
                _ => Some(value.clone()),
            },
            Slot::Deleted | Slot::Expunged => None,
        }
    }

    /// Swap in `new` unless the entry is expunged
    fn try_store(&self, new: &Arc<Slot<V>>) -> bool {
        let mut current = self.slot.load();
        loop {
            if matches!(**current, Slot::Expunged) {
                return false;
            }
            let prev = self.slot.compare_and_swap(&current, Arc::clone(new));
            if Arc::ptr_eq(&*prev, &*current) {
                return true;
            }
            current = prev;
        }
    }

    fn delete(&self) {
        let mut current = self.slot.load();
        loop {
            if !matches!(**current, Slot::Live { .. }) {
                return;
            }
            let prev = self.slot.compare_and_swap(&current, Arc::new(Slot::Deleted));
            if Arc::ptr_eq(&*prev, &*current) {
                return;
            }
            current = prev;
        }
    }

    /// `Deleted → Expunged`; reports whether the entry ends up expunged.
    /// Caller holds the shadow lock.
    fn try_expunge_locked(&self) -> bool {
        let mut current = self.slot.load();
        while matches!(**current, Slot::Deleted) {
            let prev = self.slot.compare_and_swap(&current, Arc::new(Slot::Expunged));
            if Arc::ptr_eq(&*prev, &*current) {
                return true;
            }
            current = prev;
        }
        matches!(**current, Slot::Expunged)
    }

    /// `Expunged → Deleted`; reports whether the entry was expunged.
    /// Caller holds the shadow lock, so nothing else can leave `Expunged`.
    fn unexpunge_locked(&self) -> bool {
        let current = self.slot.load();
        if !matches!(**current, Slot::Expunged) {
            return false;
        }
        let prev = self.slot.compare_and_swap(&current, Arc::new(Slot::Deleted));
        Arc::ptr_eq(&*prev, &*current)
    }

    fn store_locked(&self, new: Arc<Slot<V>>) {
        self.slot.store(new);
    }
}

type EntryMap<V> = HashMap<String, Arc<Entry<V>>>;

struct ReadOnly<V> {
    map: Arc<EntryMap<V>>,
    /// Some keys live only in the shadow map
    amended: bool,
}

struct Shadow<V> {
    map: Option<EntryMap<V>>,
    misses: usize,
}

/// Read-mostly concurrent TTL cache
///
/// # Example
///
/// ```ignore
/// let cache = MemoryCache::new();
/// cache.set("session:42", "alice".to_string(), Duration::from_secs(60))?;
/// assert_eq!(cache.get("session:42").as_deref(), Some("alice"));
/// ```
pub struct MemoryCache<V> {
    read: ArcSwap<ReadOnly<V>>,
    dirty: Mutex<Shadow<V>>,
}

impl<V: Clone> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> MemoryCache<V> {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self {
            read: ArcSwap::from_pointee(ReadOnly {
                map: Arc::new(HashMap::new()),
                amended: false,
            }),
            dirty: Mutex::new(Shadow {
                map: None,
                misses: 0,
            }),
        }
    }

    fn lookup(&self, key: &str) -> Option<V> {
        let amended = {
            let read = self.read.load();
            if let Some(entry) = read.map.get(key) {
                return entry.load();
            }
            read.amended
        };
        if !amended {
            return None;
        }

        let entry = {
            let mut shadow = self.dirty.lock();
            let read = self.read.load();
            match read.map.get(key) {
                Some(entry) => Some(Arc::clone(entry)),
                None if read.amended => {
                    let entry = shadow.map.as_ref().and_then(|m| m.get(key)).cloned();
                    self.miss_locked(&mut shadow);
                    entry
                }
                None => None,
            }
        };
        entry?.load()
    }

    fn store(&self, key: &str, value: V, ttl: Duration) {
        let slot = Arc::new(Slot::live(value, ttl));

        if let Some(entry) = self.read.load().map.get(key) {
            if entry.try_store(&slot) {
                return;
            }
        }

        let mut shadow = self.dirty.lock();
        let read = self.read.load();
        if let Some(entry) = read.map.get(key) {
            if entry.unexpunge_locked() {
                shadow
                    .map
                    .get_or_insert_with(HashMap::new)
                    .insert(key.to_string(), Arc::clone(entry));
            }
            entry.store_locked(slot);
        } else if let Some(entry) = shadow.map.as_ref().and_then(|m| m.get(key)) {
            entry.store_locked(slot);
        } else {
            if !read.amended {
                Self::dirty_locked(&mut shadow, &read);
                self.read.store(Arc::new(ReadOnly {
                    map: Arc::clone(&read.map),
                    amended: true,
                }));
            }
            shadow
                .map
                .get_or_insert_with(HashMap::new)
                .insert(key.to_string(), Arc::new(Entry::new(slot)));
        }
    }

    fn remove(&self, key: &str) {
        let amended = {
            let read = self.read.load();
            if let Some(entry) = read.map.get(key) {
                entry.delete();
                return;
            }
            read.amended
        };
        if !amended {
            return;
        }

        let shadow = self.dirty.lock();
        let read = self.read.load();
        let entry = read
            .map
            .get(key)
            .or_else(|| shadow.map.as_ref().and_then(|m| m.get(key)));
        if let Some(entry) = entry {
            entry.delete();
        }
    }

    fn miss_locked(&self, shadow: &mut Shadow<V>) {
        shadow.misses += 1;
        let Some(map) = shadow.map.as_ref() else {
            return;
        };
        if shadow.misses < map.len() {
            return;
        }
        if let Some(map) = shadow.map.take() {
            debug!(entries = map.len(), misses = shadow.misses, "Promoting cache shadow map");
            self.read.store(Arc::new(ReadOnly {
                map: Arc::new(map),
                amended: false,
            }));
        }
        shadow.misses = 0;
    }

    /// Rebuild the shadow from the snapshot, expunging deleted entries
    fn dirty_locked(shadow: &mut Shadow<V>, read: &ReadOnly<V>) {
        if shadow.map.is_some() {
            return;
        }
        let map = read
            .map
            .iter()
            .filter(|(_, entry)| !entry.try_expunge_locked())
            .map(|(key, entry)| (key.clone(), Arc::clone(entry)))
            .collect();
        shadow.map = Some(map);
    }

    #[cfg(test)]
    fn is_amended(&self) -> bool {
        self.read.load().amended
    }

    #[cfg(test)]
    fn shadow_len(&self) -> Option<usize> {
        self.dirty.lock().map.as_ref().map(HashMap::len)
    }
}

impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Option<V> {
        self.lookup(key)
    }

    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.store(key, value, ttl);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.remove(key);
        Ok(())
    }

    /// Snapshot size; entries only in the shadow map are not counted
    fn count(&self) -> usize {
        self.read.load().map.len()
    }

    /// Snapshot keys; entries only in the shadow map are not listed
    fn keys(&self) -> Vec<String> {
        self.read.load().map.keys().cloned().collect()
    }

    /// No-op: entries are dropped by expiry or `delete` only
    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

impl<V> std::fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let read = self.read.load();
        f.debug_struct("MemoryCache")
            .field("snapshot_len", &read.map.len())
            .field("amended", &read.amended)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_set_then_get() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(1)).unwrap();
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert!(cache.is_exist("k"));
    }

    #[test]
    fn test_entry_expires() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(50)).unwrap();
        assert_eq!(cache.get("k"), Some("v"));

        thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.get("k"), None);
        assert!(!cache.is_exist("k"));
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.set("k", 1, Duration::ZERO).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k"), Some(1));
    }

    #[test]
    fn test_overwrite_returns_latest() {
        let cache = MemoryCache::new();
        cache.set("k", "v1", MINUTE).unwrap();
        cache.set("k", "v2", MINUTE).unwrap();
        assert_eq!(cache.get("k"), Some("v2"));
    }

    #[test]
    fn test_overwrite_refreshes_expiry() {
        let cache = MemoryCache::new();
        cache.set("k", "short", Duration::from_millis(30)).unwrap();
        cache.set("k", "long", MINUTE).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get("k"), Some("long"));
    }

    #[test]
    fn test_absent_get_does_not_allocate_shadow() {
        let cache: MemoryCache<u32> = MemoryCache::new();
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.shadow_len(), None);
        assert!(!cache.is_amended());
    }

    #[test]
    fn test_first_write_amends_snapshot() {
        let cache = MemoryCache::new();
        cache.set("a", 1, MINUTE).unwrap();
        assert!(cache.is_amended());
        assert_eq!(cache.shadow_len(), Some(1));
        // Snapshot-only listing does not see the shadow yet
        assert_eq!(cache.count(), 0);
        assert!(cache.keys().is_empty());
    }

    #[test]
    fn test_misses_promote_shadow() {
        let cache = MemoryCache::new();
        cache.set("a", 1, MINUTE).unwrap();
        cache.set("b", 2, MINUTE).unwrap();
        assert_eq!(cache.shadow_len(), Some(2));

        // Two misses against a two-entry shadow trigger promotion
        assert_eq!(cache.get("a"), Some(1));
        assert!(cache.is_amended());
        assert_eq!(cache.get("nope"), None);

        assert!(!cache.is_amended());
        assert_eq!(cache.shadow_len(), None);
        assert_eq!(cache.count(), 2);
        let mut keys = cache.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_delete_hides_until_next_set() {
        let cache = MemoryCache::new();
        cache.set("k", "v", MINUTE).unwrap();
        cache.delete("k").unwrap();
        assert_eq!(cache.get("k"), None);

        cache.set("k", "again", MINUTE).unwrap();
        assert_eq!(cache.get("k"), Some("again"));
    }

    #[test]
    fn test_delete_missing_key_is_ok() {
        let cache: MemoryCache<u8> = MemoryCache::new();
        assert!(cache.delete("missing").is_ok());
        assert_eq!(cache.shadow_len(), None);
    }

    #[test]
    fn test_expunged_entry_is_revived_through_shadow() {
        let cache = MemoryCache::new();
        cache.set("old", 1, MINUTE).unwrap();
        // Promote so "old" lives in the snapshot
        cache.get("x");
        assert!(!cache.is_amended());

        cache.delete("old").unwrap();
        // New key rebuilds the shadow; the deleted entry is expunged and left out
        cache.set("new", 2, MINUTE).unwrap();
        assert_eq!(cache.shadow_len(), Some(1));
        assert_eq!(cache.get("old"), None);

        // Writing the expunged key re-adds it to the shadow
        cache.set("old", 3, MINUTE).unwrap();
        assert_eq!(cache.shadow_len(), Some(2));
        assert_eq!(cache.get("old"), Some(3));

        cache.get("x");
        cache.get("y");
        assert!(!cache.is_amended());
        assert_eq!(cache.get("old"), Some(3));
        assert_eq!(cache.get("new"), Some(2));
    }

    #[test]
    fn test_snapshot_write_takes_fast_path() {
        let cache = MemoryCache::new();
        cache.set("k", 1, MINUTE).unwrap();
        cache.get("miss");
        assert_eq!(cache.shadow_len(), None);

        cache.set("k", 2, MINUTE).unwrap();
        // Overwriting a snapshot entry does not rebuild the shadow
        assert_eq!(cache.shadow_len(), None);
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_clear_is_noop() {
        let cache = MemoryCache::new();
        cache.set("k", 1, MINUTE).unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.get("k"), Some(1));
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("k", (0u64, 0u64), MINUTE).unwrap();

        let handles: Vec<_> = (1..=4u64)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..500 {
                        cache.set("k", (t, t * 1000), MINUTE).unwrap();
                        let (a, b) = cache.get("k").unwrap();
                        assert_eq!(a * 1000, b);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let (a, b) = cache.get("k").unwrap();
        assert!((1..=4).contains(&a));
        assert_eq!(a * 1000, b);
    }
}

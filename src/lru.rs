//! A generic, capacity-bounded most-recently-used map with an eviction callback (§4.1).
//!
//! Built on top of the `lru` crate's intrusive doubly-linked-list implementation;
//! this module only adds the eviction-callback contract the cache store needs to
//! keep its durable DB mirror coherent (§4.2).

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Invoked with the evicted key and value exactly once per eviction.
pub type EvictionCallback<K, V> = Arc<dyn Fn(K, V) + Send + Sync>;

/// A bounded map ordered strictly by recency of the last `get` or `put`.
///
/// - `get` moves the key to the MRU position; misses don't mutate order.
/// - `put` inserts at the MRU position. Re-putting an existing key discards its
///   old position without evicting anything else. Only when capacity is exceeded
///   by a genuinely new key is the single LRU entry evicted, and the eviction
///   callback fires exactly once with that entry.
/// - `remove`/`clear` never fire the eviction callback.
pub struct LruMap<K, V>
where
    K: Eq + Hash,
{
    inner: LruCache<K, V>,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> LruMap<K, V>
where
    K: Eq + Hash + Clone,
{
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize, on_evict: Option<EvictionCallback<K, V>>) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("LruMap capacity must be non-zero");
        Self {
            inner: LruCache::new(capacity),
            on_evict,
        }
    }

    /// Returns the value for `k`, promoting it to MRU. Does not mutate order on a miss.
    pub fn get(&mut self, k: &K) -> Option<&V> {
        self.inner.get(k)
    }

    /// Inserts `v` at the MRU position. If this causes capacity to be exceeded,
    /// the single LRU entry is evicted and the eviction callback is invoked
    /// with it exactly once. Re-inserting an existing key never triggers eviction.
    pub fn put(&mut self, k: K, v: V) {
        if let Some((evicted_key, evicted_value)) = self.inner.push(k, v) {
            if let Some(callback) = &self.on_evict {
                callback(evicted_key, evicted_value);
            }
        }
    }

    /// Removes `k` without firing the eviction callback.
    pub fn remove(&mut self, k: &K) -> Option<V> {
        self.inner.pop(k)
    }

    /// Drops every entry without firing the eviction callback.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[must_use]
    pub fn contains(&self, k: &K) -> bool {
        self.inner.contains(k)
    }
}

//! In-memory cache implementation with LRU eviction.
//!
//! Provides a thread-safe in-memory cache with TTL support using
//! tokio synchronization primitives and LRU eviction policy.
//!
//! This implementation mirrors the Redis cache behavior for consistency:
//! - Integers are stored as decimal strings and `increment` fails on
//!   anything else
//! - `set_if_absent` treats an expired entry as absent
//! - Scripts run under the store's write lock, so they are indivisible with
//!   respect to every other operation

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use stocklock_core::cache::{
    evaluate_script, Cache, CacheError, CacheScript, Result, ScriptWrite,
};

/// Capacity used when a caller asks for zero entries.
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// A single cache entry with optional expiration.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    /// Creates a new cache entry with optional TTL.
    fn new(value: String, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    /// Returns true if this entry has expired.
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

/// Returns the live entry for `key`, dropping it first if it has expired.
fn live_entry<'a>(
    store: &'a mut LruCache<String, CacheEntry>,
    key: &str,
) -> Option<&'a mut CacheEntry> {
    if store.peek(key).is_some_and(CacheEntry::is_expired) {
        store.pop(key);
        return None;
    }
    store.get_mut(key)
}

/// In-memory cache implementation with LRU eviction.
///
/// Thread-safe cache using `Arc<RwLock<LruCache>>` for concurrent access.
/// Supports TTL with lazy expiration (entries are cleaned up on access).
/// Uses LRU eviction to limit memory usage when max_entries is reached;
/// size the cache well above the number of live stock mirrors and lock
/// entries, since an evicted lock entry is indistinguishable from a free one.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
}

impl MemoryCache {
    /// Creates a new in-memory cache with LRU eviction.
    ///
    /// A `max_entries` of zero falls back to the default capacity.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries)
            .or(NonZeroUsize::new(DEFAULT_MAX_ENTRIES))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    /// Number of entries currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Returns true when the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut store = self.store.write().await;
        Ok(live_entry(&mut store, key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut store = self.store.write().await;
        store.put(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut store = self.store.write().await;
        if live_entry(&mut store, key).is_some() {
            return Ok(false);
        }
        store.put(key.to_string(), CacheEntry::new(value.to_string(), Some(ttl)));
        Ok(true)
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let mut store = self.store.write().await;

        match live_entry(&mut store, key) {
            Some(entry) => {
                let current: i64 = entry.value.parse().map_err(|_| {
                    CacheError::InvalidValue(format!("value at {key} is not an integer"))
                })?;
                let next = current.checked_add(delta).ok_or_else(|| {
                    CacheError::InvalidValue(format!("increment of {key} would overflow"))
                })?;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                store.put(key.to_string(), CacheEntry::new(delta.to_string(), None));
                Ok(delta)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut store = self.store.write().await;
        store.pop(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut store = self.store.write().await;

        let keys: Vec<String> = store
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            if let Some(entry) = store.pop(&key) {
                if !entry.is_expired() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn run_atomic(&self, script: CacheScript, keys: &[&str], args: &[&str]) -> Result<i64> {
        let key = keys.first().copied().ok_or_else(|| {
            CacheError::OperationFailed(format!("{} expects one key", script.name()))
        })?;

        let mut store = self.store.write().await;
        let current = live_entry(&mut store, key).map(|entry| entry.value.clone());
        let outcome = evaluate_script(script, current.as_deref(), args)?;

        match outcome.write {
            ScriptWrite::Unchanged => {}
            ScriptWrite::Delete => {
                store.pop(key);
            }
            ScriptWrite::Set(value) => {
                if let Some(entry) = store.get_mut(key) {
                    entry.value = value;
                } else {
                    store.put(key.to_string(), CacheEntry::new(value, None));
                }
            }
        }

        Ok(outcome.reply)
    }
}

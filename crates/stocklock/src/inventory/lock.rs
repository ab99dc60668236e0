//! Named locks held in the cache.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use stocklock_core::cache::{Cache, CacheScript, Result};

/// Holder token of an acquired lock. Only the token's owner may release it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Acquires and releases expiring locks stored as cache keys.
///
/// A lock is a key whose value is the holder's token. It is created only if
/// absent and expires after its TTL, so a crashed holder never blocks others
/// for longer than that.
pub struct LockCoordinator<C> {
    cache: Arc<C>,
}

impl<C> Clone for LockCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<C: Cache> LockCoordinator<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    /// Tries once to take `key` for `ttl`.
    ///
    /// Returns `None` when another holder has it; that is not an error.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>> {
        let token = LockToken::generate();
        if self.cache.set_if_absent(key, token.as_str(), ttl).await? {
            tracing::trace!(lock_key = key, "Lock acquired");
            Ok(Some(token))
        } else {
            tracing::trace!(lock_key = key, "Lock busy");
            Ok(None)
        }
    }

    /// Deletes `key` if it still holds `token`.
    ///
    /// Returns `false` when the lock had expired or now belongs to someone
    /// else, in which case nothing is deleted.
    pub async fn release(&self, key: &str, token: &LockToken) -> Result<bool> {
        let reply = self
            .cache
            .run_atomic(CacheScript::ReleaseIfOwner, &[key], &[token.as_str()])
            .await?;
        Ok(reply == 1)
    }

    /// Releases `key`, logging instead of failing.
    pub(crate) async fn release_logged(&self, key: &str, token: &LockToken) {
        match self.release(key, token).await {
            Ok(true) => tracing::trace!(lock_key = key, "Lock released"),
            Ok(false) => {
                tracing::warn!(lock_key = key, "Lock expired before release");
            }
            Err(e) => {
                tracing::error!(lock_key = key, error = %e, "Failed to release lock");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn coordinator() -> (Arc<MemoryCache>, LockCoordinator<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new(100));
        (Arc::clone(&cache), LockCoordinator::new(cache))
    }

    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let (_, locks) = coordinator();
        let ttl = Duration::from_secs(10);

        let token = locks.acquire("stock:lock:1", ttl).await.unwrap();
        assert!(token.is_some());
        assert!(locks.acquire("stock:lock:1", ttl).await.unwrap().is_none());
        assert!(locks.acquire("stock:lock:2", ttl).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let (_, locks) = coordinator();
        let ttl = Duration::from_secs(10);

        let a = locks.acquire("a", ttl).await.unwrap().unwrap();
        let b = locks.acquire("b", ttl).await.unwrap().unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_release_frees_the_key() {
        let (_, locks) = coordinator();
        let ttl = Duration::from_secs(10);

        let token = locks.acquire("stock:lock:1", ttl).await.unwrap().unwrap();
        assert!(locks.release("stock:lock:1", &token).await.unwrap());
        assert!(locks.acquire("stock:lock:1", ttl).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_holder_cannot_release_new_holders_lock() {
        let (cache, locks) = coordinator();

        let stale = locks
            .acquire("stock:lock:1", Duration::from_millis(30))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let current = locks
            .acquire("stock:lock:1", Duration::from_secs(10))
            .await
            .unwrap()
            .unwrap();

        assert!(!locks.release("stock:lock:1", &stale).await.unwrap());
        assert_eq!(
            cache.get("stock:lock:1").await.unwrap(),
            Some(current.to_string())
        );

        assert!(locks.release("stock:lock:1", &current).await.unwrap());
        assert_eq!(cache.get("stock:lock:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lock_expires_without_release() {
        let (_, locks) = coordinator();

        locks
            .acquire("stock:lock:1", Duration::from_millis(30))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(locks
            .acquire("stock:lock:1", Duration::from_secs(1))
            .await
            .unwrap()
            .is_some());
    }
}

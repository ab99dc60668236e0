use std::time::Duration;

use async_trait::async_trait;

use super::{CacheScript, Result};

/// Trait for the key-value cache holding quantity mirrors and lock entries.
///
/// Values are UTF-8 strings; integers are stored in their decimal form.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Sets a value only if the key is absent. Returns `true` if it was set.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Adds `delta` to the integer stored at `key`, treating a missing key as
    /// zero. Returns the new value.
    async fn increment(&self, key: &str, delta: i64) -> Result<i64>;

    /// Subtracts `delta` from the integer stored at `key`.
    async fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        self.increment(key, -delta).await
    }

    /// Deletes a value from the cache by key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes every key starting with `prefix`. Returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    /// Runs a script as one indivisible operation and returns its integer reply.
    async fn run_atomic(&self, script: CacheScript, keys: &[&str], args: &[&str]) -> Result<i64>;
}

//! Redis cache implementation.
//!
//! Scripts are loaded once as [`redis::Script`] and invoked by hash, falling
//! back to `EVAL` when the server has not seen them yet. Prefix deletion uses
//! `SCAN` and then `DEL`, so keys created while it runs may survive.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use stocklock_core::cache::{Cache, CacheError, CacheScript, Result};

use super::error::map_redis_error;

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis cache backend using connection manager for pooling.
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
    release_if_owner: redis::Script,
    decrement_if_sufficient: redis::Script,
    increment_if_present: redis::Script,
}

impl RedisCache {
    /// Creates a new Redis cache connection.
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self {
            conn,
            release_if_owner: redis::Script::new(CacheScript::ReleaseIfOwner.lua()),
            decrement_if_sufficient: redis::Script::new(CacheScript::DecrementIfSufficient.lua()),
            increment_if_present: redis::Script::new(CacheScript::IncrementIfPresent.lua()),
        })
    }

    fn script(&self, script: CacheScript) -> &redis::Script {
        match script {
            CacheScript::ReleaseIfOwner => &self.release_if_owner,
            CacheScript::DecrementIfSufficient => &self.decrement_if_sufficient,
            CacheScript::IncrementIfPresent => &self.increment_if_present,
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let result: Option<String> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();

        match ttl {
            Some(duration) => {
                conn.pset_ex::<_, _, ()>(key, value, ttl_millis(duration))
                    .await
                    .map_err(map_redis_error)?;
            }
            None => {
                conn.set::<_, _, ()>(key, value)
                    .await
                    .map_err(map_redis_error)?;
            }
        }

        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();

        // SET NX replies OK when it wrote and nil when the key existed.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(reply.is_some())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, delta).await.map_err(map_redis_error)?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");

        let keys: Vec<String> = {
            let mut iter: redis::AsyncIter<String> =
                conn.scan_match(&pattern).await.map_err(map_redis_error)?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }

        let removed: u64 = conn.del(&keys).await.map_err(map_redis_error)?;
        Ok(removed)
    }

    async fn run_atomic(&self, script: CacheScript, keys: &[&str], args: &[&str]) -> Result<i64> {
        if keys.is_empty() {
            return Err(CacheError::OperationFailed(format!(
                "{} expects one key",
                script.name()
            )));
        }

        let mut conn = self.conn.clone();
        let mut invocation = self.script(script).prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(*arg);
        }

        let reply: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(reply)
    }
}

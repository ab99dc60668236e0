use std::{env, str::FromStr, time::Duration};

use stocklock_core::stock::LinearBackoff;

/// Parses `name` from the environment, falling back to `default` when unset
/// or unparsable.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TTL of a distributed stock lock in milliseconds (default: 10,000)
    pub lock_ttl_ms: u64,
    /// TTL of a synchronization lock in milliseconds (default: 5,000)
    pub sync_lock_ttl_ms: u64,
    /// Wait between distributed lock attempts in milliseconds (default: 100)
    pub lock_retry_wait_ms: u64,
    /// Wait before re-checking the cache mirror during synchronization (default: 100)
    pub sync_wait_ms: u64,
    /// Upper bound on synchronization rounds per request (default: 50)
    pub sync_max_attempts: u32,
    /// Base delay between optimistic retries in milliseconds (default: 10)
    pub optimistic_backoff_base_ms: u64,
    /// Extra delay per failed optimistic attempt in milliseconds (default: 5)
    pub optimistic_backoff_step_ms: u64,
    /// Attempts used by retrying strategies when the caller gives none (default: 10)
    pub default_max_retries: u32,
    /// Maximum number of in-memory cache entries (default: 10,000)
    pub cache_max_entries: usize,
    /// Path to SQLite database file (default: "stocklock.db")
    pub sqlite_path: String,
    /// How long SQLite waits on a locked database in milliseconds (default: 5,000)
    pub sqlite_busy_timeout_ms: u64,
    /// Redis connection URL (default: "redis://localhost:6379")
    /// Note: Only used when the `redis` feature is enabled.
    pub redis_url: String,
}

impl Config {
    /// Built-in defaults, ignoring the environment.
    pub fn defaults() -> Self {
        Self {
            lock_ttl_ms: 10_000,
            sync_lock_ttl_ms: 5_000,
            lock_retry_wait_ms: 100,
            sync_wait_ms: 100,
            sync_max_attempts: 50,
            optimistic_backoff_base_ms: 10,
            optimistic_backoff_step_ms: 5,
            default_max_retries: 10,
            cache_max_entries: 10_000,
            sqlite_path: "stocklock.db".to_string(),
            sqlite_busy_timeout_ms: 5_000,
            redis_url: "redis://localhost:6379".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `LOCK_TTL_MS` - Distributed lock TTL (default: 10,000)
    /// - `SYNC_LOCK_TTL_MS` - Synchronization lock TTL (default: 5,000)
    /// - `LOCK_RETRY_WAIT_MS` - Wait between lock attempts (default: 100)
    /// - `SYNC_WAIT_MS` - Wait before re-checking the mirror (default: 100)
    /// - `SYNC_MAX_ATTEMPTS` - Synchronization rounds per request (default: 50)
    /// - `OPTIMISTIC_BACKOFF_BASE_MS` - Optimistic backoff base (default: 10)
    /// - `OPTIMISTIC_BACKOFF_STEP_MS` - Optimistic backoff step (default: 5)
    /// - `DEFAULT_MAX_RETRIES` - Default attempts for retrying strategies (default: 10)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    /// - `SQLITE_PATH` - SQLite database path (default: "stocklock.db")
    /// - `SQLITE_BUSY_TIMEOUT_MS` - SQLite busy timeout (default: 5,000)
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> Self {
        let defaults = Self::defaults();
        Self {
            lock_ttl_ms: env_or("LOCK_TTL_MS", defaults.lock_ttl_ms),
            sync_lock_ttl_ms: env_or("SYNC_LOCK_TTL_MS", defaults.sync_lock_ttl_ms),
            lock_retry_wait_ms: env_or("LOCK_RETRY_WAIT_MS", defaults.lock_retry_wait_ms),
            sync_wait_ms: env_or("SYNC_WAIT_MS", defaults.sync_wait_ms),
            sync_max_attempts: env_or("SYNC_MAX_ATTEMPTS", defaults.sync_max_attempts),
            optimistic_backoff_base_ms: env_or(
                "OPTIMISTIC_BACKOFF_BASE_MS",
                defaults.optimistic_backoff_base_ms,
            ),
            optimistic_backoff_step_ms: env_or(
                "OPTIMISTIC_BACKOFF_STEP_MS",
                defaults.optimistic_backoff_step_ms,
            ),
            default_max_retries: env_or("DEFAULT_MAX_RETRIES", defaults.default_max_retries),
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            sqlite_path: env::var("SQLITE_PATH").unwrap_or(defaults.sqlite_path),
            sqlite_busy_timeout_ms: env_or(
                "SQLITE_BUSY_TIMEOUT_MS",
                defaults.sqlite_busy_timeout_ms,
            ),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
        }
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn sync_lock_ttl(&self) -> Duration {
        Duration::from_millis(self.sync_lock_ttl_ms)
    }

    pub fn lock_retry_wait(&self) -> Duration {
        Duration::from_millis(self.lock_retry_wait_ms)
    }

    pub fn sync_wait(&self) -> Duration {
        Duration::from_millis(self.sync_wait_ms)
    }

    pub fn sqlite_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.sqlite_busy_timeout_ms)
    }

    /// Backoff between optimistic retries.
    pub fn optimistic_backoff(&self) -> LinearBackoff {
        LinearBackoff::new(
            Duration::from_millis(self.optimistic_backoff_base_ms),
            Duration::from_millis(self.optimistic_backoff_step_ms),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

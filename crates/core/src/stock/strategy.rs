use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::StrategyParseError;

/// How a decrement is protected against concurrent callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DecrementStrategy {
    /// Read, compare and write in one transaction without any lock.
    /// Concurrent callers can lose updates.
    NoLock,
    /// Versioned read and write; contention surfaces as `Conflict`.
    Optimistic,
    /// [`Optimistic`](DecrementStrategy::Optimistic) retried with linear backoff.
    OptimisticRetry { max_retries: u32 },
    /// Exclusive row lock held for the whole transaction.
    Pessimistic,
    /// A single conditional update statement.
    Atomic,
    /// Transaction guarded by a cache-held lock; fails fast when it is taken.
    DistributedLock,
    /// [`DistributedLock`](DecrementStrategy::DistributedLock) with a fixed wait
    /// between acquisition attempts.
    DistributedLockRetry { max_retries: u32 },
    /// Atomic decrement of the cache mirror, written back to the store.
    CacheDirect,
}

impl DecrementStrategy {
    /// Every strategy, with `max_retries` filled in for the retrying ones.
    pub fn all(max_retries: u32) -> [DecrementStrategy; 8] {
        [
            DecrementStrategy::NoLock,
            DecrementStrategy::Optimistic,
            DecrementStrategy::OptimisticRetry { max_retries },
            DecrementStrategy::Pessimistic,
            DecrementStrategy::Atomic,
            DecrementStrategy::DistributedLock,
            DecrementStrategy::DistributedLockRetry { max_retries },
            DecrementStrategy::CacheDirect,
        ]
    }

    /// Parses a selector name, as sent by the service layer.
    ///
    /// Retrying strategies take `max_retries` when given, else `default_retries`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stocklock_core::stock::DecrementStrategy;
    ///
    /// let strategy = DecrementStrategy::from_selector("optimistic_retry", Some(5), 10).unwrap();
    /// assert_eq!(strategy, DecrementStrategy::OptimisticRetry { max_retries: 5 });
    ///
    /// let strategy = DecrementStrategy::from_selector("redis_direct", None, 10).unwrap();
    /// assert_eq!(strategy, DecrementStrategy::CacheDirect);
    /// ```
    pub fn from_selector(
        name: &str,
        max_retries: Option<u32>,
        default_retries: u32,
    ) -> Result<Self, StrategyParseError> {
        let max_retries = max_retries.unwrap_or(default_retries);
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");

        let strategy = match normalized.as_str() {
            "none" | "no_lock" => DecrementStrategy::NoLock,
            "optimistic" => DecrementStrategy::Optimistic,
            "optimistic_retry" => DecrementStrategy::OptimisticRetry { max_retries },
            "pessimistic" | "pessimistic_write" => DecrementStrategy::Pessimistic,
            "atomic" => DecrementStrategy::Atomic,
            "distributed" | "distributed_lock" | "redis" => DecrementStrategy::DistributedLock,
            "distributed_retry" | "distributed_lock_retry" | "redis_retry" => {
                DecrementStrategy::DistributedLockRetry { max_retries }
            }
            "cache_direct" | "redis_direct" => DecrementStrategy::CacheDirect,
            _ => return Err(StrategyParseError::Unknown(name.to_string())),
        };

        if strategy.max_attempts() == 0 {
            return Err(StrategyParseError::ZeroRetries);
        }
        Ok(strategy)
    }

    /// Canonical selector name.
    pub const fn name(&self) -> &'static str {
        match self {
            DecrementStrategy::NoLock => "no_lock",
            DecrementStrategy::Optimistic => "optimistic",
            DecrementStrategy::OptimisticRetry { .. } => "optimistic_retry",
            DecrementStrategy::Pessimistic => "pessimistic",
            DecrementStrategy::Atomic => "atomic",
            DecrementStrategy::DistributedLock => "distributed_lock",
            DecrementStrategy::DistributedLockRetry { .. } => "distributed_lock_retry",
            DecrementStrategy::CacheDirect => "cache_direct",
        }
    }

    /// Upper bound on attempts a single request may make.
    pub const fn max_attempts(&self) -> u32 {
        match self {
            DecrementStrategy::OptimisticRetry { max_retries }
            | DecrementStrategy::DistributedLockRetry { max_retries } => *max_retries,
            _ => 1,
        }
    }
}

impl fmt::Display for DecrementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Linear backoff between optimistic retries: `base + attempt * step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    pub base: Duration,
    pub step: Duration,
}

impl LinearBackoff {
    pub const fn new(base: Duration, step: Duration) -> Self {
        Self { base, step }
    }

    /// Delay to wait after the `attempt`-th failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base + self.step.saturating_mul(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_names_round_trip() {
        for strategy in DecrementStrategy::all(3) {
            let parsed = DecrementStrategy::from_selector(strategy.name(), Some(3), 10).unwrap();
            assert_eq!(parsed, strategy);
        }
    }

    #[test]
    fn test_selector_aliases() {
        assert_eq!(
            DecrementStrategy::from_selector("none", None, 5).unwrap(),
            DecrementStrategy::NoLock
        );
        assert_eq!(
            DecrementStrategy::from_selector("REDIS", None, 5).unwrap(),
            DecrementStrategy::DistributedLock
        );
        assert_eq!(
            DecrementStrategy::from_selector("redis-retry", None, 5).unwrap(),
            DecrementStrategy::DistributedLockRetry { max_retries: 5 }
        );
    }

    #[test]
    fn test_unknown_selector() {
        assert_eq!(
            DecrementStrategy::from_selector("magic", None, 5),
            Err(StrategyParseError::Unknown("magic".to_string()))
        );
    }

    #[test]
    fn test_zero_retries_rejected() {
        assert_eq!(
            DecrementStrategy::from_selector("optimistic_retry", Some(0), 5),
            Err(StrategyParseError::ZeroRetries)
        );
        // Non-retrying strategies ignore the retry count.
        assert!(DecrementStrategy::from_selector("atomic", Some(0), 5).is_ok());
    }

    #[test]
    fn test_max_attempts() {
        assert_eq!(DecrementStrategy::Optimistic.max_attempts(), 1);
        assert_eq!(
            DecrementStrategy::OptimisticRetry { max_retries: 4 }.max_attempts(),
            4
        );
    }

    #[test]
    fn test_strategy_json_shape() {
        let json = serde_json::to_value(DecrementStrategy::OptimisticRetry { max_retries: 3 }).unwrap();
        assert_eq!(json["strategy"], "optimistic_retry");
        assert_eq!(json["max_retries"], 3);
    }

    #[test]
    fn test_linear_backoff() {
        let backoff = LinearBackoff::new(Duration::from_millis(10), Duration::from_millis(5));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(15));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_millis(30));
    }
}

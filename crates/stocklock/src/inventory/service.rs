//! Caller-facing stock operations.

use std::sync::Arc;
use std::time::Duration;

use stocklock_core::cache::{quantity_key, Cache, CacheError, QUANTITY_PREFIX};
use stocklock_core::stock::{
    ensure_available, validate_amount, validate_quantity, DecrementStrategy, Decremented,
    LinearBackoff, LockMode, Stock, StockError, StockId,
};
use stocklock_core::storage::{StockStore, StockTransaction};

use super::lock::LockCoordinator;
use super::strategies::ReadKind;
use super::sync::{StockSynchronizer, SyncSettings};
use crate::config::Config;

/// Timing knobs of the strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// TTL of the per-stock distributed lock.
    pub lock_ttl: Duration,
    /// Wait between distributed lock attempts.
    pub lock_retry_wait: Duration,
    /// Delay between optimistic attempts.
    pub backoff: LinearBackoff,
    pub sync: SyncSettings,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lock_ttl: config.lock_ttl(),
            lock_retry_wait: config.lock_retry_wait(),
            backoff: config.optimistic_backoff(),
            sync: SyncSettings {
                lock_ttl: config.sync_lock_ttl(),
                wait: config.sync_wait(),
                max_attempts: config.sync_max_attempts,
            },
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&Config::defaults())
    }
}

/// Decrements stock quantities with a caller-chosen concurrency strategy.
///
/// The service holds no per-request state; clones share the same store and
/// cache.
pub struct StockService<S, C> {
    pub(super) store: Arc<S>,
    pub(super) cache: Arc<C>,
    pub(super) locks: LockCoordinator<C>,
    pub(super) sync: StockSynchronizer<S, C>,
    pub(super) settings: ServiceSettings,
}

impl<S, C> Clone for StockService<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            locks: self.locks.clone(),
            sync: self.sync.clone(),
            settings: self.settings,
        }
    }
}

impl<S, C> StockService<S, C>
where
    S: StockStore,
    C: Cache,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, settings: ServiceSettings) -> Self {
        let locks = LockCoordinator::new(Arc::clone(&cache));
        let sync = StockSynchronizer::new(Arc::clone(&store), Arc::clone(&cache), settings.sync);
        Self {
            store,
            cache,
            locks,
            sync,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Takes `amount` off stock `id` using `strategy`.
    ///
    /// Returns the quantity left on success. Non-positive amounts are
    /// rejected before any strategy runs.
    pub async fn decrement(
        &self,
        id: StockId,
        amount: i64,
        strategy: DecrementStrategy,
    ) -> Result<Decremented, StockError> {
        validate_amount(amount)?;

        let result = match strategy {
            DecrementStrategy::NoLock => {
                self.transactional_decrement(id, amount, ReadKind::Plain)
                    .await
            }
            DecrementStrategy::Optimistic => {
                self.transactional_decrement(id, amount, ReadKind::Versioned)
                    .await
            }
            DecrementStrategy::OptimisticRetry { max_retries } => {
                self.optimistic_with_retry(id, amount, max_retries).await
            }
            DecrementStrategy::Pessimistic => {
                self.transactional_decrement(id, amount, ReadKind::Locked)
                    .await
            }
            DecrementStrategy::Atomic => self.atomic_decrement(id, amount).await,
            DecrementStrategy::DistributedLock => self.distributed_lock(id, amount).await,
            DecrementStrategy::DistributedLockRetry { max_retries } => {
                self.distributed_lock_with_retry(id, amount, max_retries)
                    .await
            }
            DecrementStrategy::CacheDirect => self.cache_direct(id, amount).await,
        };

        match &result {
            Ok(done) => tracing::info!(
                stock_id = id,
                amount,
                remaining = done.remaining,
                %strategy,
                "Stock decremented"
            ),
            Err(e @ (StockError::Conflict { .. } | StockError::Exhausted { .. })) => {
                tracing::warn!(stock_id = id, amount, %strategy, error = %e, "Decrement lost to contention")
            }
            Err(e) => {
                tracing::debug!(stock_id = id, amount, %strategy, error = %e, "Decrement rejected")
            }
        }

        result
    }

    /// Inserts a new stock record.
    pub async fn create_stock(&self, product_name: &str, quantity: i64) -> Result<Stock, StockError> {
        validate_quantity(quantity)?;

        let stock = self
            .store
            .create_stock(product_name, quantity)
            .await
            .map_err(StockError::Storage)?;

        tracing::info!(stock_id = stock.id, product_name, quantity, "Stock created");
        Ok(stock)
    }

    /// Reads a stock record.
    pub async fn get_stock(&self, id: StockId) -> Result<Stock, StockError> {
        self.store
            .read(id)
            .await
            .map_err(|e| StockError::from_repository(id, e))?
            .ok_or(StockError::NotFound { id })
    }

    /// Overwrites the quantity and drops the cache mirror, so the next
    /// cache-path decrement copies the new value.
    pub async fn reset_stock(&self, id: StockId, quantity: i64) -> Result<Stock, StockError> {
        validate_quantity(quantity)?;

        let stock = self
            .store
            .reset_quantity(id, quantity)
            .await
            .map_err(|e| StockError::from_repository(id, e))?;
        self.cache.delete(&quantity_key(id)).await?;

        tracing::info!(stock_id = id, quantity, "Stock reset");
        Ok(stock)
    }

    /// Reads the cache mirror of `id`; `None` on a miss.
    pub async fn cached_quantity(&self, id: StockId) -> Result<Option<i64>, StockError> {
        let Some(raw) = self.cache.get(&quantity_key(id)).await? else {
            tracing::trace!(stock_id = id, "Cache miss");
            return Ok(None);
        };

        let quantity = raw.parse().map_err(|_| {
            CacheError::InvalidValue(format!("mirror of stock {id} is not an integer: {raw:?}"))
        })?;
        Ok(Some(quantity))
    }

    /// Deletes every cache mirror. Lock entries are left alone.
    pub async fn clear_cache(&self) -> Result<u64, StockError> {
        let removed = self.cache.delete_prefix(QUANTITY_PREFIX).await?;
        tracing::info!(removed, "Cache mirrors cleared");
        Ok(removed)
    }

    /// Checks under a shared row lock that at least `amount` is available.
    ///
    /// Returns the current quantity; nothing is written.
    pub async fn check_availability(&self, id: StockId, amount: i64) -> Result<i64, StockError> {
        validate_amount(amount)?;
        let repo = move |e| StockError::from_repository(id, e);

        let mut tx = self.store.begin().await.map_err(repo)?;
        let stock = tx
            .read_for_update(id, LockMode::SharedRead)
            .await
            .map_err(repo)?
            .ok_or(StockError::NotFound { id })?;
        ensure_available(&stock, amount)?;
        tx.commit().await.map_err(repo)?;

        Ok(stock.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::storage::InMemoryStockStore;

    fn service() -> StockService<InMemoryStockStore, MemoryCache> {
        StockService::new(
            Arc::new(InMemoryStockStore::new()),
            Arc::new(MemoryCache::new(100)),
            ServiceSettings::default(),
        )
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            lock_ttl_ms: 2_000,
            sync_max_attempts: 7,
            ..Config::defaults()
        };
        let settings = ServiceSettings::from_config(&config);

        assert_eq!(settings.lock_ttl, Duration::from_secs(2));
        assert_eq!(settings.lock_retry_wait, Duration::from_millis(100));
        assert_eq!(settings.sync.max_attempts, 7);
        assert_eq!(settings.sync.lock_ttl, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_create_and_get_stock() {
        let service = service();
        let created = service.create_stock("chair", 12).await.unwrap();

        let read = service.get_stock(created.id).await.unwrap();
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn test_create_rejects_negative_quantity() {
        let service = service();
        let result = service.create_stock("chair", -1).await;
        assert_eq!(result, Err(StockError::InvalidQuantity(-1)));
    }

    #[tokio::test]
    async fn test_get_missing_stock() {
        let service = service();
        assert_eq!(
            service.get_stock(77).await,
            Err(StockError::NotFound { id: 77 })
        );
    }

    #[tokio::test]
    async fn test_decrement_rejects_non_positive_amount() {
        let service = service();
        let stock = service.create_stock("chair", 12).await.unwrap();

        for strategy in DecrementStrategy::all(3) {
            assert_eq!(
                service.decrement(stock.id, 0, strategy).await,
                Err(StockError::InvalidAmount(0))
            );
            assert_eq!(
                service.decrement(stock.id, -2, strategy).await,
                Err(StockError::InvalidAmount(-2))
            );
        }
        assert_eq!(service.get_stock(stock.id).await.unwrap().quantity, 12);
    }

    #[tokio::test]
    async fn test_reset_stock_drops_mirror() {
        let service = service();
        let stock = service.create_stock("chair", 12).await.unwrap();

        service
            .decrement(stock.id, 2, DecrementStrategy::CacheDirect)
            .await
            .unwrap();
        assert_eq!(service.cached_quantity(stock.id).await.unwrap(), Some(10));

        let reset = service.reset_stock(stock.id, 100).await.unwrap();
        assert_eq!(reset.quantity, 100);
        assert_eq!(service.cached_quantity(stock.id).await.unwrap(), None);

        let done = service
            .decrement(stock.id, 1, DecrementStrategy::CacheDirect)
            .await
            .unwrap();
        assert_eq!(done.remaining, 99);
    }

    #[tokio::test]
    async fn test_reset_missing_stock() {
        let service = service();
        assert_eq!(
            service.reset_stock(5, 1).await,
            Err(StockError::NotFound { id: 5 })
        );
    }

    #[tokio::test]
    async fn test_cached_quantity_rejects_garbage() {
        let service = service();
        service
            .cache()
            .set(&quantity_key(3), "many", None)
            .await
            .unwrap();

        let result = service.cached_quantity(3).await;
        assert!(matches!(
            result,
            Err(StockError::Cache(CacheError::InvalidValue(_)))
        ));
    }

    #[tokio::test]
    async fn test_clear_cache_keeps_locks() {
        let service = service();
        let a = service.create_stock("a", 5).await.unwrap();
        let b = service.create_stock("b", 5).await.unwrap();

        for id in [a.id, b.id] {
            service
                .decrement(id, 1, DecrementStrategy::CacheDirect)
                .await
                .unwrap();
        }
        service
            .cache()
            .set("stock:lock:99", "token", Some(Duration::from_secs(10)))
            .await
            .unwrap();

        assert_eq!(service.clear_cache().await.unwrap(), 2);
        assert_eq!(service.cached_quantity(a.id).await.unwrap(), None);
        assert!(service.cache().get("stock:lock:99").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_check_availability() {
        let service = service();
        let stock = service.create_stock("chair", 3).await.unwrap();

        assert_eq!(service.check_availability(stock.id, 3).await, Ok(3));
        assert_eq!(
            service.check_availability(stock.id, 4).await,
            Err(StockError::InsufficientQuantity {
                id: stock.id,
                available: 3,
                requested: 4
            })
        );
        assert_eq!(
            service.check_availability(404, 1).await,
            Err(StockError::NotFound { id: 404 })
        );
        // Read-only: nothing changed.
        assert_eq!(service.get_stock(stock.id).await.unwrap().version, 0);
    }
}

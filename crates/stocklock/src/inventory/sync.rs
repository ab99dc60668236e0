//! Populates cache mirrors from the store.

use std::sync::Arc;
use std::time::Duration;

use stocklock_core::cache::{quantity_key, sync_lock_key, Cache};
use stocklock_core::stock::{StockError, StockId};
use stocklock_core::storage::StockStore;

use super::lock::LockCoordinator;

/// Timing of the synchronization protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub lock_ttl: Duration,
    pub wait: Duration,
    pub max_attempts: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(5),
            wait: Duration::from_millis(100),
            max_attempts: 50,
        }
    }
}

/// Copies the authoritative quantity into the cache mirror.
///
/// Only the holder of the per-stock sync lock copies. Everyone else waits
/// and looks for the mirror again, taking another turn at the lock if it is
/// still missing.
pub struct StockSynchronizer<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    locks: LockCoordinator<C>,
    settings: SyncSettings,
}

impl<S, C> Clone for StockSynchronizer<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            locks: self.locks.clone(),
            settings: self.settings,
        }
    }
}

impl<S, C> StockSynchronizer<S, C>
where
    S: StockStore,
    C: Cache,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, settings: SyncSettings) -> Self {
        let locks = LockCoordinator::new(Arc::clone(&cache));
        Self {
            store,
            cache,
            locks,
            settings,
        }
    }

    /// Makes sure the mirror of `id` exists.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the store has no such stock
    /// - `SynchronizationFailed` when the mirror cannot be written or is
    ///   still missing after `max_attempts` rounds
    pub async fn synchronize(&self, id: StockId) -> Result<(), StockError> {
        let lock_key = sync_lock_key(id);
        let mirror_key = quantity_key(id);

        for attempt in 1..=self.settings.max_attempts {
            let token = self
                .locks
                .acquire(&lock_key, self.settings.lock_ttl)
                .await
                .map_err(|e| sync_failed(id, e))?;

            if let Some(token) = token {
                let result = self.copy_from_store(id, &mirror_key).await;
                self.locks.release_logged(&lock_key, &token).await;
                return result;
            }

            tracing::debug!(stock_id = id, attempt, "Waiting for another synchronizer");
            tokio::time::sleep(self.settings.wait).await;

            let mirror = self
                .cache
                .get(&mirror_key)
                .await
                .map_err(|e| sync_failed(id, e))?;
            if mirror.is_some() {
                return Ok(());
            }
        }

        Err(StockError::SynchronizationFailed {
            id,
            reason: format!(
                "mirror still missing after {} attempts",
                self.settings.max_attempts
            ),
        })
    }

    async fn copy_from_store(&self, id: StockId, mirror_key: &str) -> Result<(), StockError> {
        // Another synchronizer may have finished between our miss and our lock.
        let existing = self
            .cache
            .get(mirror_key)
            .await
            .map_err(|e| sync_failed(id, e))?;
        if existing.is_some() {
            return Ok(());
        }

        let stock = self
            .store
            .read(id)
            .await
            .map_err(|e| StockError::from_repository(id, e))?
            .ok_or(StockError::NotFound { id })?;

        self.cache
            .set(mirror_key, &stock.quantity.to_string(), None)
            .await
            .map_err(|e| sync_failed(id, e))?;

        tracing::debug!(stock_id = id, quantity = stock.quantity, "Cache mirror populated");
        Ok(())
    }
}

fn sync_failed(id: StockId, err: impl std::fmt::Display) -> StockError {
    StockError::SynchronizationFailed {
        id,
        reason: err.to_string(),
    }
}

//! The decrement strategies.
//!
//! Each strategy is a method on [`StockService`]; `StockService::decrement`
//! dispatches on [`DecrementStrategy`](stocklock_core::stock::DecrementStrategy).
//! Every attempt of a retrying strategy opens and commits its own
//! transaction.

use stocklock_core::cache::{
    decode_decrement_reply, lock_key, quantity_key, Cache, CacheScript, DecrementReply,
    MIRROR_MISSING,
};
use stocklock_core::stock::{apply_decrement, Decremented, LockMode, StockError, StockId};
use stocklock_core::storage::{StockStore, StockTransaction};

use super::service::StockService;

/// How the transactional strategies read the row before writing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReadKind {
    /// No lock, no version check.
    Plain,
    /// Remember the version; the save fails if it moved.
    Versioned,
    /// Exclusive row lock until commit.
    Locked,
}

impl<S, C> StockService<S, C>
where
    S: StockStore,
    C: Cache,
{
    /// Read, validate and write inside one transaction.
    pub(super) async fn transactional_decrement(
        &self,
        id: StockId,
        amount: i64,
        read: ReadKind,
    ) -> Result<Decremented, StockError> {
        let repo = move |e| StockError::from_repository(id, e);

        let mut tx = self.store.begin().await.map_err(repo)?;
        let stock = match read {
            ReadKind::Plain => tx.read(id).await,
            ReadKind::Versioned => tx.read_versioned(id).await,
            ReadKind::Locked => tx.read_for_update(id, LockMode::ExclusiveWrite).await,
        }
        .map_err(repo)?
        .ok_or(StockError::NotFound { id })?;

        let next = apply_decrement(&stock, amount)?;
        tx.save(&next).await.map_err(repo)?;
        tx.commit().await.map_err(repo)?;

        Ok(Decremented {
            stock_id: id,
            amount,
            remaining: next.quantity,
        })
    }

    pub(super) async fn optimistic_with_retry(
        &self,
        id: StockId,
        amount: i64,
        max_retries: u32,
    ) -> Result<Decremented, StockError> {
        for attempt in 1..=max_retries {
            match self
                .transactional_decrement(id, amount, ReadKind::Versioned)
                .await
            {
                Err(e) if e.is_retryable() => {
                    if attempt == max_retries {
                        break;
                    }
                    let delay = self.settings.backoff.delay_for_attempt(attempt);
                    tracing::warn!(
                        stock_id = id,
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Optimistic conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }

        Err(StockError::Exhausted {
            id,
            attempts: max_retries,
        })
    }

    /// One conditional update; a follow-up read only explains a rejection.
    pub(super) async fn atomic_decrement(
        &self,
        id: StockId,
        amount: i64,
    ) -> Result<Decremented, StockError> {
        let affected = self
            .store
            .conditional_decrement(id, amount)
            .await
            .map_err(|e| StockError::from_repository(id, e))?;

        if affected == 0 {
            return Err(self.explain_rejection(id, amount).await);
        }

        // Other callers may have decremented since; this is the value we saw.
        let remaining = self
            .store
            .read(id)
            .await
            .map_err(|e| StockError::from_repository(id, e))?
            .map(|stock| stock.quantity)
            .ok_or(StockError::NotFound { id })?;

        Ok(Decremented {
            stock_id: id,
            amount,
            remaining,
        })
    }

    pub(super) async fn distributed_lock(
        &self,
        id: StockId,
        amount: i64,
    ) -> Result<Decremented, StockError> {
        match self.try_locked_decrement(id, amount).await {
            Err(StockError::LockAcquisitionFailed { .. }) => Err(StockError::Conflict { id }),
            other => other,
        }
    }

    pub(super) async fn distributed_lock_with_retry(
        &self,
        id: StockId,
        amount: i64,
        max_retries: u32,
    ) -> Result<Decremented, StockError> {
        for attempt in 1..=max_retries {
            match self.try_locked_decrement(id, amount).await {
                Err(e) if e.is_retryable() => {
                    if attempt == max_retries {
                        break;
                    }
                    tracing::debug!(stock_id = id, attempt, max_retries, "Lock busy, waiting");
                    tokio::time::sleep(self.settings.lock_retry_wait).await;
                }
                other => return other,
            }
        }

        tracing::warn!(stock_id = id, max_retries, "Gave up waiting for lock");
        Err(StockError::Exhausted {
            id,
            attempts: max_retries,
        })
    }

    /// Takes the stock's distributed lock once and, if that worked, runs the
    /// transactional decrement under it.
    async fn try_locked_decrement(
        &self,
        id: StockId,
        amount: i64,
    ) -> Result<Decremented, StockError> {
        let key = lock_key(id);
        let Some(token) = self.locks.acquire(&key, self.settings.lock_ttl).await? else {
            return Err(StockError::LockAcquisitionFailed { key });
        };

        let result = self
            .transactional_decrement(id, amount, ReadKind::Plain)
            .await;
        self.locks.release_logged(&key, &token).await;
        result
    }

    /// Decrements the cache mirror atomically, then applies the same
    /// decrement to the store. A failed store write gives the amount back to
    /// the mirror.
    pub(super) async fn cache_direct(
        &self,
        id: StockId,
        amount: i64,
    ) -> Result<Decremented, StockError> {
        let key = quantity_key(id);
        let amount_arg = amount.to_string();
        let mut synchronized = false;

        let remaining = loop {
            let reply = self
                .cache
                .run_atomic(
                    CacheScript::DecrementIfSufficient,
                    &[key.as_str()],
                    &[amount_arg.as_str()],
                )
                .await?;

            match decode_decrement_reply(reply)? {
                DecrementReply::Remaining(remaining) => break remaining,
                DecrementReply::Insufficient => {
                    let available = match self.cached_quantity(id).await {
                        Ok(cached) => cached.unwrap_or(0),
                        Err(e) => {
                            tracing::debug!(
                                stock_id = id,
                                error = %e,
                                "Could not read mirror for diagnostics, reporting 0 available"
                            );
                            0
                        }
                    };
                    return Err(StockError::InsufficientQuantity {
                        id,
                        available,
                        requested: amount,
                    });
                }
                DecrementReply::Missing if !synchronized => {
                    tracing::debug!(stock_id = id, "Cache miss, synchronizing mirror");
                    self.sync.synchronize(id).await?;
                    synchronized = true;
                }
                DecrementReply::Missing => return Err(StockError::NotFound { id }),
            }
        };

        if let Err(store_error) = self.write_back(id, amount).await {
            return Err(self.compensate(id, amount, &key, store_error).await);
        }

        Ok(Decremented {
            stock_id: id,
            amount,
            remaining,
        })
    }

    async fn write_back(&self, id: StockId, amount: i64) -> Result<(), StockError> {
        let affected = self
            .store
            .conditional_decrement(id, amount)
            .await
            .map_err(|e| StockError::from_repository(id, e))?;

        if affected == 0 {
            return Err(self.explain_rejection(id, amount).await);
        }
        Ok(())
    }

    /// Adds `amount` back to the mirror and returns the error to surface.
    ///
    /// A mirror that vanished in the meantime is left absent; the next
    /// synchronization reloads it from the store.
    async fn compensate(
        &self,
        id: StockId,
        amount: i64,
        key: &str,
        store_error: StockError,
    ) -> StockError {
        let amount_arg = amount.to_string();
        let restore = self
            .cache
            .run_atomic(CacheScript::IncrementIfPresent, &[key], &[amount_arg.as_str()])
            .await;

        match restore {
            Ok(MIRROR_MISSING) => {
                tracing::warn!(
                    stock_id = id,
                    amount,
                    error = %store_error,
                    "Store write failed, mirror already gone"
                );
                store_error
            }
            Ok(restored) => {
                tracing::warn!(
                    stock_id = id,
                    amount,
                    restored,
                    error = %store_error,
                    "Store write failed, cache decrement reverted"
                );
                store_error
            }
            Err(cache_error) => {
                tracing::error!(
                    stock_id = id,
                    amount,
                    store_error = %store_error,
                    cache_error = %cache_error,
                    "Store write and cache compensation both failed"
                );
                StockError::CompensationFailed {
                    id,
                    amount,
                    store_error: store_error.to_string(),
                    cache_error: cache_error.to_string(),
                }
            }
        }
    }

    /// Tells a missing row from an insufficient one after a conditional
    /// update touched nothing.
    async fn explain_rejection(&self, id: StockId, amount: i64) -> StockError {
        match self.store.read(id).await {
            Ok(Some(stock)) => StockError::InsufficientQuantity {
                id,
                available: stock.quantity,
                requested: amount,
            },
            Ok(None) => StockError::NotFound { id },
            Err(e) => StockError::from_repository(id, e),
        }
    }
}

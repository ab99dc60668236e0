use async_trait::async_trait;

use crate::stock::{LockMode, Stock, StockId};

use super::Result;

/// Narrow interface over the relational store that owns stock records.
///
/// Operations on the store itself run in their own implicit transaction.
/// Multi-step read-validate-write sequences go through [`StockStore::begin`].
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Transaction handle produced by [`StockStore::begin`].
    type Tx: StockTransaction;

    /// Opens a new unit of work. Dropping the handle without committing
    /// discards its writes and releases any row locks it holds.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Inserts a new stock record and returns it with its assigned id.
    async fn create_stock(&self, product_name: &str, quantity: i64) -> Result<Stock>;

    /// Reads a stock record without taking any lock.
    async fn read(&self, id: StockId) -> Result<Option<Stock>>;

    /// Decrements the quantity by `amount` only if `quantity >= amount`, as a
    /// single indivisible statement.
    ///
    /// Returns the number of rows affected: `0` when the row is missing or the
    /// quantity is too low.
    async fn conditional_decrement(&self, id: StockId, amount: i64) -> Result<u64>;

    /// Overwrites the quantity of an existing record.
    async fn reset_quantity(&self, id: StockId, quantity: i64) -> Result<Stock>;
}

/// A unit of work against the stock table.
///
/// Row locks taken through [`StockTransaction::read_for_update`] are held
/// until [`StockTransaction::commit`] returns or the handle is dropped.
#[async_trait]
pub trait StockTransaction: Send {
    /// Reads a record without locking it.
    async fn read(&mut self, id: StockId) -> Result<Option<Stock>>;

    /// Reads a record after acquiring a row lock in the given mode.
    async fn read_for_update(&mut self, id: StockId, mode: LockMode) -> Result<Option<Stock>>;

    /// Reads a record and remembers its version. A later [`save`] of the same
    /// id fails with `StaleVersion` if the stored version moved in between.
    ///
    /// [`save`]: StockTransaction::save
    async fn read_versioned(&mut self, id: StockId) -> Result<Option<Stock>>;

    /// Persists the full record. Every committed save bumps the version.
    async fn save(&mut self, stock: &Stock) -> Result<()>;

    /// Commits all writes and releases row locks.
    async fn commit(self) -> Result<()>;
}

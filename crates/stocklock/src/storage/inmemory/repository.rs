//! In-memory stock store with row locks and versioned writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use stocklock_core::stock::{LockMode, Stock, StockId};
use stocklock_core::storage::{RepositoryError, Result, StockStore, StockTransaction};

/// A stored record together with the lock guarding its row.
#[derive(Debug)]
struct Row {
    stock: Stock,
    lock: Arc<RwLock<()>>,
}

type Table = Arc<RwLock<HashMap<StockId, Row>>>;

fn not_found(id: StockId) -> RepositoryError {
    RepositoryError::NotFound {
        entity_type: "Stock",
        id: id.to_string(),
    }
}

/// Sleeps for the configured latency, if any.
async fn simulate_io(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

async fn row_lock(rows: &Table, id: StockId) -> Option<Arc<RwLock<()>>> {
    rows.read().await.get(&id).map(|row| Arc::clone(&row.lock))
}

async fn snapshot(rows: &Table, id: StockId) -> Option<Stock> {
    rows.read().await.get(&id).map(|row| row.stock.clone())
}

/// In-memory stock store.
///
/// Each row carries its own `tokio::sync::RwLock<()>` that transactions use as
/// a row lock. Writes from plain statements and from committing transactions
/// take the row's write lock, so they wait for any transaction holding a
/// shared or exclusive lock on that row.
///
/// An optional latency is slept before every read and commit, which stands in
/// for network round trips and makes interleavings of concurrent callers
/// observable.
#[derive(Debug, Clone)]
pub struct InMemoryStockStore {
    rows: Table,
    next_id: Arc<AtomicI64>,
    latency: Duration,
}

impl Default for InMemoryStockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStockStore {
    /// Creates an empty store without simulated latency.
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Creates an empty store that sleeps `latency` on every read and commit.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            latency,
        }
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            rows: Arc::clone(&self.rows),
            latency: self.latency,
            guards: HashMap::new(),
            versions: HashMap::new(),
            pending: HashMap::new(),
        })
    }

    async fn create_stock(&self, product_name: &str, quantity: i64) -> Result<Stock> {
        if quantity < 0 {
            return Err(RepositoryError::InvalidData(format!(
                "quantity must not be negative: {quantity}"
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stock = Stock::new(id, product_name, quantity);

        simulate_io(self.latency).await;
        let mut rows = self.rows.write().await;
        rows.insert(
            id,
            Row {
                stock: stock.clone(),
                lock: Arc::new(RwLock::new(())),
            },
        );
        Ok(stock)
    }

    async fn read(&self, id: StockId) -> Result<Option<Stock>> {
        simulate_io(self.latency).await;
        Ok(snapshot(&self.rows, id).await)
    }

    async fn conditional_decrement(&self, id: StockId, amount: i64) -> Result<u64> {
        simulate_io(self.latency).await;

        let Some(lock) = row_lock(&self.rows, id).await else {
            return Ok(0);
        };
        let _row_guard = lock.write_owned().await;

        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(0);
        };
        if row.stock.quantity < amount {
            return Ok(0);
        }

        row.stock.quantity -= amount;
        row.stock.version += 1;
        row.stock.updated_at = Utc::now();
        Ok(1)
    }

    async fn reset_quantity(&self, id: StockId, quantity: i64) -> Result<Stock> {
        if quantity < 0 {
            return Err(RepositoryError::InvalidData(format!(
                "quantity must not be negative: {quantity}"
            )));
        }
        simulate_io(self.latency).await;

        let lock = row_lock(&self.rows, id).await.ok_or_else(|| not_found(id))?;
        let _row_guard = lock.write_owned().await;

        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id).ok_or_else(|| not_found(id))?;
        row.stock.quantity = quantity;
        row.stock.version += 1;
        row.stock.updated_at = Utc::now();
        Ok(row.stock.clone())
    }
}

/// Row lock held by a transaction until it ends.
#[derive(Debug)]
enum RowGuard {
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

/// Transaction over [`InMemoryStockStore`].
///
/// Saves are buffered and applied together at commit, after the version of
/// every row read through [`read_versioned`](StockTransaction::read_versioned)
/// has been checked. Dropping the transaction discards the buffer and
/// releases its row locks.
#[derive(Debug)]
pub struct InMemoryTransaction {
    rows: Table,
    latency: Duration,
    guards: HashMap<StockId, RowGuard>,
    versions: HashMap<StockId, i64>,
    pending: HashMap<StockId, Stock>,
}

impl InMemoryTransaction {
    async fn current(&self, id: StockId) -> Option<Stock> {
        match self.pending.get(&id) {
            Some(stock) => Some(stock.clone()),
            None => snapshot(&self.rows, id).await,
        }
    }
}

#[async_trait]
impl StockTransaction for InMemoryTransaction {
    async fn read(&mut self, id: StockId) -> Result<Option<Stock>> {
        simulate_io(self.latency).await;
        Ok(self.current(id).await)
    }

    async fn read_for_update(&mut self, id: StockId, mode: LockMode) -> Result<Option<Stock>> {
        match (self.guards.get(&id), mode) {
            (Some(RowGuard::Exclusive(_)), _) | (Some(RowGuard::Shared(_)), LockMode::SharedRead) => {}
            (Some(RowGuard::Shared(_)), LockMode::ExclusiveWrite) => {
                return Err(RepositoryError::QueryFailed(format!(
                    "cannot upgrade shared lock on stock {id} to exclusive"
                )));
            }
            (None, _) => {
                let Some(lock) = row_lock(&self.rows, id).await else {
                    return Ok(None);
                };
                let guard = match mode {
                    LockMode::SharedRead => RowGuard::Shared(lock.read_owned().await),
                    LockMode::ExclusiveWrite => RowGuard::Exclusive(lock.write_owned().await),
                };
                self.guards.insert(id, guard);
            }
        }

        simulate_io(self.latency).await;
        Ok(self.current(id).await)
    }

    async fn read_versioned(&mut self, id: StockId) -> Result<Option<Stock>> {
        simulate_io(self.latency).await;
        let stock = self.current(id).await;
        if let Some(ref s) = stock {
            self.versions.entry(id).or_insert(s.version);
        }
        Ok(stock)
    }

    async fn save(&mut self, stock: &Stock) -> Result<()> {
        if stock.quantity < 0 {
            return Err(RepositoryError::InvalidData(format!(
                "quantity must not be negative: {}",
                stock.quantity
            )));
        }
        self.pending.insert(stock.id, stock.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        simulate_io(self.latency).await;

        // Writers take row locks in id order so two committers never deadlock.
        let mut ids: Vec<StockId> = self.pending.keys().copied().collect();
        ids.sort_unstable();

        let mut write_guards = Vec::new();
        for id in &ids {
            match self.guards.get(id) {
                Some(RowGuard::Exclusive(_)) => {}
                Some(RowGuard::Shared(_)) => {
                    return Err(RepositoryError::QueryFailed(format!(
                        "cannot write stock {id} under a shared lock"
                    )));
                }
                None => {
                    let lock = row_lock(&self.rows, *id).await.ok_or_else(|| not_found(*id))?;
                    write_guards.push(lock.write_owned().await);
                }
            }
        }

        let mut rows = self.rows.write().await;

        for id in &ids {
            let row = rows.get(id).ok_or_else(|| not_found(*id))?;
            if let Some(&expected) = self.versions.get(id) {
                if row.stock.version != expected {
                    return Err(RepositoryError::StaleVersion { id: *id, expected });
                }
            }
        }

        let now = Utc::now();
        for (id, stock) in self.pending.drain() {
            if let Some(row) = rows.get_mut(&id) {
                row.stock.product_name = stock.product_name;
                row.stock.quantity = stock.quantity;
                row.stock.version += 1;
                row.stock.updated_at = now;
            }
        }

        drop(rows);
        drop(write_guards);
        Ok(())
    }
}

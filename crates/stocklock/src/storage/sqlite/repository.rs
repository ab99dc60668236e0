//! SQLite stock store.
//!
//! Implements `StockStore` from `stocklock_core::storage` using SQLite.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::Connection;

use stocklock_core::stock::{LockMode, Stock, StockId};
use stocklock_core::storage::{RepositoryError, Result, StockStore, StockTransaction};

use super::conversions::{format_datetime, row_to_stock};
use super::error::map_tokio_rusqlite_error_with_id;
use super::schema;

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

fn select_stock(conn: &rusqlite::Connection, id: StockId) -> tokio_rusqlite::Result<Option<Stock>> {
    let mut stmt = conn
        .prepare_cached(schema::SELECT_STOCK_BY_ID)
        .map_err(wrap_err)?;
    match stmt.query_row([id], row_to_stock) {
        Ok(stock) => Ok(Some(stock)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(wrap_err(e)),
    }
}

/// Opens a connection with the store's pragmas and busy timeout applied.
async fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)
        .await
        .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

    conn.call(move |conn| {
        conn.busy_timeout(busy_timeout).map_err(wrap_err)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", schema::JOURNAL_MODE, |row| row.get(0))
            .map_err(wrap_err)?;
        conn.pragma_update(None, "synchronous", schema::SYNCHRONOUS)
            .map_err(wrap_err)?;
        tracing::trace!(journal_mode = %mode, "SQLite connection opened");
        Ok(())
    })
    .await
    .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

    Ok(conn)
}

/// SQLite-based stock store.
///
/// Plain statements run on a shared connection. Every transaction opens its
/// own connection so that SQLite's locking applies between concurrent
/// transactions; dropping the transaction closes that connection, which rolls
/// back anything uncommitted.
pub struct SqliteStockStore {
    conn: Connection,
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStockStore {
    /// Opens (or creates) a file-based database and creates the schema.
    pub async fn new(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_connection(&path, busy_timeout).await?;

        conn.call(|conn| {
            conn.execute_batch(schema::CREATE_TABLES)
                .map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        Ok(Self {
            conn,
            path,
            busy_timeout,
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StockStore for SqliteStockStore {
    type Tx = SqliteTransaction;

    async fn begin(&self) -> Result<SqliteTransaction> {
        let conn = open_connection(&self.path, self.busy_timeout).await?;
        Ok(SqliteTransaction {
            conn,
            state: TxState::Idle,
            versions: HashMap::new(),
        })
    }

    async fn create_stock(&self, product_name: &str, quantity: i64) -> Result<Stock> {
        let product_name = product_name.to_string();
        let updated_at = format_datetime(&Utc::now());

        self.conn
            .call(move |conn| {
                conn.execute(
                    schema::INSERT_STOCK,
                    rusqlite::params![product_name, quantity, updated_at],
                )
                .map_err(wrap_err)?;
                let id = conn.last_insert_rowid();
                select_stock(conn, id)?
                    .ok_or_else(|| wrap_err(rusqlite::Error::QueryReturnedNoRows))
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "Stock", "new"))
    }

    async fn read(&self, id: StockId) -> Result<Option<Stock>> {
        self.conn
            .call(move |conn| select_stock(conn, id))
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "Stock", id.to_string()))
    }

    async fn conditional_decrement(&self, id: StockId, amount: i64) -> Result<u64> {
        let updated_at = format_datetime(&Utc::now());

        self.conn
            .call(move |conn| {
                let affected = conn
                    .execute(
                        schema::DECREMENT_IF_SUFFICIENT,
                        rusqlite::params![id, amount, updated_at],
                    )
                    .map_err(wrap_err)?;
                Ok(affected as u64)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "Stock", id.to_string()))
    }

    async fn reset_quantity(&self, id: StockId, quantity: i64) -> Result<Stock> {
        let updated_at = format_datetime(&Utc::now());

        self.conn
            .call(move |conn| {
                let affected = conn
                    .execute(
                        schema::RESET_QUANTITY,
                        rusqlite::params![id, quantity, updated_at],
                    )
                    .map_err(wrap_err)?;
                if affected == 0 {
                    return Err(wrap_err(rusqlite::Error::QueryReturnedNoRows));
                }
                select_stock(conn, id)?
                    .ok_or_else(|| wrap_err(rusqlite::Error::QueryReturnedNoRows))
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "Stock", id.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Idle,
    Open,
}

/// Transaction over [`SqliteStockStore`].
///
/// The SQLite transaction starts lazily with the first operation. An
/// exclusive [`read_for_update`](StockTransaction::read_for_update) as the
/// first operation starts it with `BEGIN IMMEDIATE`, which takes the
/// database write lock up front; anything else starts a deferred
/// transaction. SQLite locks the whole database rather than single rows.
pub struct SqliteTransaction {
    conn: Connection,
    state: TxState,
    versions: HashMap<StockId, i64>,
}

impl SqliteTransaction {
    async fn ensure_open(&mut self, immediate: bool) -> Result<()> {
        if self.state == TxState::Open {
            return Ok(());
        }

        let sql = if immediate {
            schema::BEGIN_IMMEDIATE
        } else {
            schema::BEGIN_DEFERRED
        };
        self.conn
            .call(move |conn| {
                conn.execute_batch(sql).map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "Stock", "transaction"))?;

        self.state = TxState::Open;
        Ok(())
    }

    async fn select(&self, id: StockId) -> Result<Option<Stock>> {
        self.conn
            .call(move |conn| select_stock(conn, id))
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "Stock", id.to_string()))
    }
}

#[async_trait]
impl StockTransaction for SqliteTransaction {
    async fn read(&mut self, id: StockId) -> Result<Option<Stock>> {
        self.ensure_open(false).await?;
        self.select(id).await
    }

    async fn read_for_update(&mut self, id: StockId, mode: LockMode) -> Result<Option<Stock>> {
        self.ensure_open(mode == LockMode::ExclusiveWrite).await?;
        self.select(id).await
    }

    async fn read_versioned(&mut self, id: StockId) -> Result<Option<Stock>> {
        self.ensure_open(false).await?;
        let stock = self.select(id).await?;
        if let Some(ref s) = stock {
            self.versions.entry(id).or_insert(s.version);
        }
        Ok(stock)
    }

    async fn save(&mut self, stock: &Stock) -> Result<()> {
        self.ensure_open(false).await?;

        let id = stock.id;
        let product_name = stock.product_name.clone();
        let quantity = stock.quantity;
        let updated_at = format_datetime(&stock.updated_at);
        let expected = self.versions.get(&id).copied();

        let affected = self
            .conn
            .call(move |conn| {
                let affected = match expected {
                    Some(version) => conn.execute(
                        schema::UPDATE_STOCK_IF_VERSION,
                        rusqlite::params![id, product_name, quantity, updated_at, version],
                    ),
                    None => conn.execute(
                        schema::UPDATE_STOCK,
                        rusqlite::params![id, product_name, quantity, updated_at],
                    ),
                }
                .map_err(wrap_err)?;
                Ok(affected)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "Stock", id.to_string()))?;

        match (affected, expected) {
            (0, Some(expected)) => {
                // Either the version moved or the row is gone.
                if self.select(id).await?.is_some() {
                    Err(RepositoryError::StaleVersion { id, expected })
                } else {
                    Err(RepositoryError::NotFound {
                        entity_type: "Stock",
                        id: id.to_string(),
                    })
                }
            }
            (0, None) => Err(RepositoryError::NotFound {
                entity_type: "Stock",
                id: id.to_string(),
            }),
            _ => {
                // Later saves of the same row in this transaction see our write.
                if let Some(version) = self.versions.get_mut(&id) {
                    *version += 1;
                }
                Ok(())
            }
        }
    }

    async fn commit(self) -> Result<()> {
        if self.state == TxState::Idle {
            return Ok(());
        }

        self.conn
            .call(|conn| {
                conn.execute_batch(schema::COMMIT).map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "Stock", "transaction"))
    }
}

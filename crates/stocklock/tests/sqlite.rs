//! Strategies against a real SQLite file.

#![cfg(feature = "sqlite")]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use stocklock::benchmark::{run_benchmark, BenchmarkPlan};
use stocklock::cache::MemoryCache;
use stocklock::inventory::{ServiceSettings, StockService};
use stocklock::storage::SqliteStockStore;
use stocklock_core::stock::{DecrementStrategy, StockError};

struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("stocklock-it-{}.db", Uuid::new_v4()));
        Self { path }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

async fn service(db: &TempDb) -> StockService<SqliteStockStore, MemoryCache> {
    let store = SqliteStockStore::new(&db.path, Duration::from_secs(5))
        .await
        .unwrap();
    let settings = ServiceSettings {
        lock_retry_wait: Duration::from_millis(5),
        ..ServiceSettings::default()
    };
    StockService::new(Arc::new(store), Arc::new(MemoryCache::new(100)), settings)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serializing_strategies_are_exact_on_sqlite() {
    let strategies = [
        DecrementStrategy::Pessimistic,
        DecrementStrategy::Atomic,
        DecrementStrategy::DistributedLockRetry { max_retries: 500 },
        DecrementStrategy::CacheDirect,
    ];

    for strategy in strategies {
        let db = TempDb::new();
        let service = service(&db).await;
        let plan = BenchmarkPlan {
            product_name: "desk".to_string(),
            initial_quantity: 100,
            callers: 10,
            amount: 1,
            strategy,
        };

        let report = run_benchmark(&service, &plan).await.unwrap();

        assert_eq!(report.successes, 10, "{strategy}: {report:?}");
        assert_eq!(report.final_quantity, 90, "{strategy}");
        assert_eq!(report.lost_decrements, 0, "{strategy}");
    }
}

#[tokio::test]
async fn single_caller_outcomes_on_sqlite() {
    let db = TempDb::new();
    let service = service(&db).await;
    let stock = service.create_stock("desk", 3).await.unwrap();

    for strategy in DecrementStrategy::all(3) {
        let result = service.decrement(stock.id, 5, strategy).await;
        assert_eq!(
            result,
            Err(StockError::InsufficientQuantity {
                id: stock.id,
                available: 3,
                requested: 5
            }),
            "{strategy}"
        );
    }

    let done = service
        .decrement(stock.id, 3, DecrementStrategy::Optimistic)
        .await
        .unwrap();
    assert_eq!(done.remaining, 0);

    let stock = service.get_stock(stock.id).await.unwrap();
    assert_eq!(stock.quantity, 0);
    assert_eq!(stock.version, 1);
}

#[tokio::test]
async fn reset_on_sqlite_drops_the_mirror() {
    let db = TempDb::new();
    let service = service(&db).await;
    let stock = service.create_stock("desk", 5).await.unwrap();

    service
        .decrement(stock.id, 1, DecrementStrategy::CacheDirect)
        .await
        .unwrap();
    assert_eq!(service.cached_quantity(stock.id).await.unwrap(), Some(4));

    service.reset_stock(stock.id, 50).await.unwrap();
    assert_eq!(service.cached_quantity(stock.id).await.unwrap(), None);
    assert_eq!(service.get_stock(stock.id).await.unwrap().quantity, 50);
}

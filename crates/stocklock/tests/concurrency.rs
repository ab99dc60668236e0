//! Concurrent callers against one stock, per strategy.

use std::sync::Arc;
use std::time::Duration;

use stocklock::benchmark::{run_benchmark, BenchmarkPlan, BenchmarkReport};
use stocklock::cache::MemoryCache;
use stocklock::inventory::{ServiceSettings, StockService, SyncSettings};
use stocklock::storage::InMemoryStockStore;
use stocklock_core::cache::{lock_key, sync_lock_key, Cache};
use stocklock_core::stock::DecrementStrategy;

fn service(latency: Duration) -> StockService<InMemoryStockStore, MemoryCache> {
    let settings = ServiceSettings {
        lock_retry_wait: Duration::from_millis(5),
        sync: SyncSettings {
            wait: Duration::from_millis(5),
            ..SyncSettings::default()
        },
        ..ServiceSettings::default()
    };
    StockService::new(
        Arc::new(InMemoryStockStore::with_latency(latency)),
        Arc::new(MemoryCache::new(1_000)),
        settings,
    )
}

async fn hammer(
    service: &StockService<InMemoryStockStore, MemoryCache>,
    strategy: DecrementStrategy,
    initial_quantity: i64,
    callers: usize,
    amount: i64,
) -> BenchmarkReport {
    let plan = BenchmarkPlan {
        product_name: format!("item-{}", strategy.name()),
        initial_quantity,
        callers,
        amount,
        strategy,
    };
    run_benchmark(service, &plan).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pessimistic_ten_callers_leave_ninety() {
    let service = service(Duration::from_millis(10));

    let report = hammer(&service, DecrementStrategy::Pessimistic, 100, 10, 1).await;

    assert_eq!(report.successes, 10);
    assert_eq!(report.failure_count(), 0);
    assert_eq!(report.final_quantity, 90);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serializing_strategies_apply_every_decrement_exactly_once() {
    const CALLERS: usize = 20;
    const AMOUNT: i64 = 2;

    // A caller's optimistic attempt only fails when another caller commits
    // inside its window, and each caller commits once, so CALLERS attempts
    // always suffice.
    let strategies = [
        DecrementStrategy::Pessimistic,
        DecrementStrategy::Atomic,
        DecrementStrategy::OptimisticRetry {
            max_retries: CALLERS as u32,
        },
        DecrementStrategy::DistributedLockRetry { max_retries: 200 },
        DecrementStrategy::CacheDirect,
    ];

    for strategy in strategies {
        let service = service(Duration::from_millis(5));
        let report = hammer(&service, strategy, 100, CALLERS, AMOUNT).await;

        assert_eq!(report.successes, CALLERS as u64, "{strategy}: {report:?}");
        assert_eq!(report.failure_count(), 0, "{strategy}: {report:?}");
        assert_eq!(report.final_quantity, 100 - CALLERS as i64 * AMOUNT, "{strategy}");
        assert_eq!(report.lost_decrements, 0, "{strategy}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cache_direct_keeps_mirror_and_store_equal() {
    let service = service(Duration::from_millis(2));

    let report = hammer(&service, DecrementStrategy::CacheDirect, 50, 30, 1).await;

    assert_eq!(report.successes, 30);
    assert_eq!(report.final_quantity, 20);
    assert_eq!(report.cached_quantity, Some(20));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serializing_strategies_stop_exactly_at_zero() {
    for strategy in [
        DecrementStrategy::Pessimistic,
        DecrementStrategy::Atomic,
        DecrementStrategy::CacheDirect,
    ] {
        let service = service(Duration::from_millis(1));
        let report = hammer(&service, strategy, 10, 25, 1).await;

        assert_eq!(report.successes, 10, "{strategy}");
        assert_eq!(
            report.failures.get("insufficient_quantity"),
            Some(&15),
            "{strategy}: {report:?}"
        );
        assert_eq!(report.final_quantity, 0, "{strategy}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn optimistic_without_retry_rejects_contended_callers() {
    let service = service(Duration::from_millis(20));

    let report = hammer(&service, DecrementStrategy::Optimistic, 100, 10, 1).await;

    assert!(report.successes < 10, "{report:?}");
    assert!(report.failure_count() > 0);
    assert_eq!(report.successes + report.failure_count(), 10);
    assert_eq!(report.failures.get("conflict"), Some(&report.failure_count()));
    assert_eq!(report.final_quantity, 100 - report.successes as i64);
    assert_eq!(report.lost_decrements, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn optimistic_with_retry_serves_every_caller() {
    let service = service(Duration::from_millis(20));

    let report = hammer(
        &service,
        DecrementStrategy::OptimisticRetry { max_retries: 15 },
        100,
        10,
        1,
    )
    .await;

    assert_eq!(report.successes, 10, "{report:?}");
    assert_eq!(report.failure_count(), 0);
    assert_eq!(report.final_quantity, 90);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_lock_loses_updates() {
    let service = service(Duration::from_millis(20));

    let report = hammer(&service, DecrementStrategy::NoLock, 100, 10, 1).await;

    // Every caller believes it succeeded, but they all wrote over each other.
    assert_eq!(report.successes, 10);
    assert!(report.final_quantity > 90, "{report:?}");
    assert!(report.lost_decrements > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distributed_lock_without_retry_fails_fast() {
    let service = service(Duration::from_millis(10));

    let report = hammer(&service, DecrementStrategy::DistributedLock, 100, 10, 1).await;

    assert!(report.successes >= 1, "{report:?}");
    assert!(report.failure_count() > 0);
    assert_eq!(report.failures.get("conflict"), Some(&report.failure_count()));
    assert_eq!(report.final_quantity, 100 - report.successes as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn locks_are_gone_after_a_run() {
    let service = service(Duration::from_millis(1));

    let report = hammer(
        &service,
        DecrementStrategy::DistributedLockRetry { max_retries: 100 },
        100,
        10,
        1,
    )
    .await;
    assert_eq!(report.successes, 10);

    let lock = lock_key(report.stock_id);
    let sync_lock = sync_lock_key(report.stock_id);
    assert_eq!(service.cache().get(&lock).await.unwrap(), None);
    assert_eq!(service.cache().get(&sync_lock).await.unwrap(), None);
}

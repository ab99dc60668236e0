//! Contention benchmark: many concurrent callers against one stock.

use std::collections::BTreeMap;
use std::time::Instant;

use futures_util::future::join_all;
use serde::Serialize;

use stocklock_core::cache::Cache;
use stocklock_core::stock::{DecrementStrategy, StockError, StockId};
use stocklock_core::storage::StockStore;

use crate::inventory::StockService;

/// What to run.
#[derive(Debug, Clone)]
pub struct BenchmarkPlan {
    pub product_name: String,
    pub initial_quantity: i64,
    pub callers: usize,
    pub amount: i64,
    pub strategy: DecrementStrategy,
}

/// Outcome of one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchmarkReport {
    pub strategy: &'static str,
    pub max_attempts: u32,
    pub stock_id: StockId,
    pub initial_quantity: i64,
    pub callers: usize,
    pub amount: i64,
    pub successes: u64,
    /// Failed calls by error kind.
    pub failures: BTreeMap<&'static str, u64>,
    pub final_quantity: i64,
    /// Mirror value after the run; `None` when the strategy never touched it.
    pub cached_quantity: Option<i64>,
    /// `final_quantity` minus what the successes account for. Non-zero means
    /// decrements were lost.
    pub lost_decrements: i64,
    pub elapsed_ms: u64,
}

impl BenchmarkReport {
    pub fn failure_count(&self) -> u64 {
        self.failures.values().sum()
    }
}

/// Creates a fresh stock and fires `plan.callers` concurrent decrements at it.
pub async fn run_benchmark<S, C>(
    service: &StockService<S, C>,
    plan: &BenchmarkPlan,
) -> Result<BenchmarkReport, StockError>
where
    S: StockStore + 'static,
    C: Cache + 'static,
{
    let stock = service
        .create_stock(&plan.product_name, plan.initial_quantity)
        .await?;

    tracing::info!(
        stock_id = stock.id,
        callers = plan.callers,
        strategy = %plan.strategy,
        "Benchmark started"
    );

    let started = Instant::now();
    let tasks = (0..plan.callers).map(|_| {
        let service = service.clone();
        let (id, amount, strategy) = (stock.id, plan.amount, plan.strategy);
        tokio::spawn(async move { service.decrement(id, amount, strategy).await })
    });
    let results = join_all(tasks).await;
    let elapsed = started.elapsed();

    let mut successes = 0u64;
    let mut failures = BTreeMap::new();
    for result in results {
        match result {
            Ok(Ok(_)) => successes += 1,
            Ok(Err(e)) => *failures.entry(e.kind()).or_insert(0) += 1,
            Err(join_error) => {
                tracing::error!(error = %join_error, "Benchmark caller panicked");
                *failures.entry("panicked").or_insert(0) += 1;
            }
        }
    }

    let final_quantity = service.get_stock(stock.id).await?.quantity;
    let cached_quantity = service.cached_quantity(stock.id).await?;
    let consumed = i64::try_from(successes).unwrap_or(i64::MAX).saturating_mul(plan.amount);
    let lost_decrements = final_quantity - (plan.initial_quantity - consumed);

    Ok(BenchmarkReport {
        strategy: plan.strategy.name(),
        max_attempts: plan.strategy.max_attempts(),
        stock_id: stock.id,
        initial_quantity: plan.initial_quantity,
        callers: plan.callers,
        amount: plan.amount,
        successes,
        failures,
        final_quantity,
        cached_quantity,
        lost_decrements,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    })
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stocklock::benchmark::{run_benchmark, BenchmarkPlan, BenchmarkReport};
use stocklock::cache::MemoryCache;
use stocklock::storage::InMemoryStockStore;
use stocklock::{Config, ServiceSettings, StockService};
use stocklock_core::cache::Cache;
use stocklock_core::stock::DecrementStrategy;
use stocklock_core::storage::StockStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// In-process store
    Memory,
    /// SQLite database at SQLITE_PATH (needs the `sqlite` feature)
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CacheKind {
    /// In-process LRU cache
    Memory,
    /// Redis at REDIS_URL (needs the `redis` feature)
    Redis,
}

/// stocklock - Hammer one stock record with concurrent decrements
#[derive(Parser, Debug)]
#[command(name = "stocklock")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Decrement strategy, or `all` to run each in turn
    #[arg(long, short, default_value = "pessimistic")]
    strategy: String,

    /// Attempts for retrying strategies (defaults to DEFAULT_MAX_RETRIES)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Number of concurrent callers
    #[arg(long, short = 'n', default_value_t = 100)]
    callers: usize,

    /// Starting quantity of the stock
    #[arg(long, default_value_t = 100)]
    initial: i64,

    /// Amount each caller takes
    #[arg(long, default_value_t = 1)]
    amount: i64,

    /// Store backend
    #[arg(long, value_enum, default_value_t = StoreKind::Memory, env = "STOCKLOCK_STORE")]
    store: StoreKind,

    /// Cache backend
    #[arg(long, value_enum, default_value_t = CacheKind::Memory, env = "STOCKLOCK_CACHE")]
    cache: CacheKind,

    /// Simulated latency of the in-memory store, in milliseconds
    #[arg(long, default_value_t = 0)]
    store_latency_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stocklock=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    let plans = build_plans(&cli, &config)?;

    let reports = match cli.store {
        StoreKind::Memory => {
            let latency = Duration::from_millis(cli.store_latency_ms);
            let store = Arc::new(InMemoryStockStore::with_latency(latency));
            run_with_store(store, cli.cache, &config, &plans).await?
        }
        #[cfg(feature = "sqlite")]
        StoreKind::Sqlite => {
            let store = stocklock::storage::SqliteStockStore::new(
                &config.sqlite_path,
                config.sqlite_busy_timeout(),
            )
            .await?;
            run_with_store(Arc::new(store), cli.cache, &config, &plans).await?
        }
        #[cfg(not(feature = "sqlite"))]
        StoreKind::Sqlite => anyhow::bail!("stocklock was built without the `sqlite` feature"),
    };

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn build_plans(cli: &Cli, config: &Config) -> Result<Vec<BenchmarkPlan>> {
    let strategies = if cli.strategy.eq_ignore_ascii_case("all") {
        let retries = cli.max_retries.unwrap_or(config.default_max_retries);
        DecrementStrategy::all(retries).to_vec()
    } else {
        vec![DecrementStrategy::from_selector(
            &cli.strategy,
            cli.max_retries,
            config.default_max_retries,
        )?]
    };

    Ok(strategies
        .into_iter()
        .map(|strategy| BenchmarkPlan {
            product_name: format!("benchmark-{}", strategy.name()),
            initial_quantity: cli.initial,
            callers: cli.callers,
            amount: cli.amount,
            strategy,
        })
        .collect())
}

async fn run_with_store<S>(
    store: Arc<S>,
    cache: CacheKind,
    config: &Config,
    plans: &[BenchmarkPlan],
) -> Result<Vec<BenchmarkReport>>
where
    S: StockStore + 'static,
{
    match cache {
        CacheKind::Memory => {
            let cache = Arc::new(MemoryCache::new(config.cache_max_entries));
            run_plans(store, cache, config, plans).await
        }
        #[cfg(feature = "redis")]
        CacheKind::Redis => {
            let cache = Arc::new(stocklock::cache::RedisCache::new(&config.redis_url).await?);
            run_plans(store, cache, config, plans).await
        }
        #[cfg(not(feature = "redis"))]
        CacheKind::Redis => anyhow::bail!("stocklock was built without the `redis` feature"),
    }
}

async fn run_plans<S, C>(
    store: Arc<S>,
    cache: Arc<C>,
    config: &Config,
    plans: &[BenchmarkPlan],
) -> Result<Vec<BenchmarkReport>>
where
    S: StockStore + 'static,
    C: Cache + 'static,
{
    let service = StockService::new(store, cache, ServiceSettings::from_config(config));

    let mut reports = Vec::with_capacity(plans.len());
    for plan in plans {
        let report = run_benchmark(&service, plan).await?;
        tracing::info!(
            strategy = report.strategy,
            successes = report.successes,
            failures = report.failure_count(),
            final_quantity = report.final_quantity,
            elapsed_ms = report.elapsed_ms,
            "Benchmark finished"
        );
        reports.push(report);
    }
    Ok(reports)
}

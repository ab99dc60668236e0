//! Concurrency-controlled stock decrements.
//!
//! [`StockService`] is the entry point. It is generic over the store and the
//! cache, so the same strategies run against the in-memory adapters in tests
//! and against SQLite and Redis in the benchmark.
//!
//! # Example
//!
//! ```rust,ignore
//! use stocklock::inventory::{ServiceSettings, StockService};
//! use stocklock_core::stock::DecrementStrategy;
//!
//! let service = StockService::new(store, cache, ServiceSettings::default());
//! let stock = service.create_stock("keyboard", 100).await?;
//! let done = service.decrement(stock.id, 1, DecrementStrategy::Pessimistic).await?;
//! ```

mod lock;
mod service;
mod strategies;
mod sync;

pub use lock::{LockCoordinator, LockToken};
pub use service::{ServiceSettings, StockService};
pub use sync::{StockSynchronizer, SyncSettings};

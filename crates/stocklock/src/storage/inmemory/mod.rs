//! In-memory storage backend.
//!
//! Stores stock rows in a HashMap wrapped in `Arc<RwLock<_>>`, with one
//! `RwLock<()>` per row standing in for the relational store's row locks.
//! Useful for tests and for benchmarking strategies without a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use stocklock::storage::inmemory::InMemoryStockStore;
//!
//! let store = InMemoryStockStore::with_latency(Duration::from_millis(5));
//! ```

mod repository;

pub use repository::{InMemoryStockStore, InMemoryTransaction};

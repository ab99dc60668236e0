//! Storage backend implementations.
//!
//! This module provides concrete implementations of the `StockStore` trait
//! defined in `stocklock_core::storage`.
//!
//! # Feature Flags
//!
//! - The in-memory store is always available
//! - `sqlite` (default): SQLite storage backend using `rusqlite` and `tokio-rusqlite`
//!
//! # Examples
//!
//! Build with SQLite (default):
//! ```bash
//! cargo build -p stocklock
//! ```
//!
//! Build with only the in-memory store:
//! ```bash
//! cargo build -p stocklock --no-default-features
//! ```

pub mod inmemory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use inmemory::InMemoryStockStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStockStore;

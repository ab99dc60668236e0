//! Inventory decrements that stay correct under concurrent callers.
//!
//! The pure domain (types, errors, key layout, script semantics) lives in
//! `stocklock_core`. This crate adds the adapters, the lock coordinator, the
//! cache synchronizer and the strategies themselves.

pub mod benchmark;
pub mod cache;
pub mod config;
pub mod inventory;
pub mod storage;

pub use config::Config;
pub use inventory::{ServiceSettings, StockService};

//! Cache backend implementations.
//!
//! This module provides concrete implementations of the `Cache` trait
//! defined in `stocklock_core::cache`.
//!
//! # Feature Flags
//!
//! - The in-memory cache is always available
//! - `redis`: Redis cache using the redis crate
//!
//! Both backends can be compiled in together; the binary picks one at
//! startup.

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_impl;

pub use memory::MemoryCache;

#[cfg(feature = "redis")]
pub use redis_impl::RedisCache;

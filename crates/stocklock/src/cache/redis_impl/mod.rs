//! Redis cache backend implementation.
//!
//! Shares quantity mirrors and lock entries between processes. Scripts run
//! server-side, which makes them indivisible across every client.

mod cache;
mod error;

pub use cache::RedisCache;

//! Functional core of the stocklock inventory controller.
//!
//! Everything in this crate is either pure data, a pure function, or an
//! async trait describing a collaborator. The I/O lives in the `stocklock`
//! crate, which implements the traits for concrete stores and caches.
//!
//! - [`stock`]: the stock record, strategy selector, error taxonomy and
//!   the pure decrement rules.
//! - [`storage`]: the quantity store adapter traits and their errors.
//! - [`cache`]: the cache adapter trait, key namespaces and atomic scripts.

pub mod cache;
pub mod stock;
pub mod storage;

mod error;
mod operations;
mod strategy;
mod types;

pub use error::{StockError, StrategyParseError};
pub use operations::{apply_decrement, ensure_available, validate_amount, validate_quantity};
pub use strategy::{DecrementStrategy, LinearBackoff};
pub use types::{Decremented, LockMode, Stock, StockId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a stock record.
pub type StockId = i64;

/// A stock record as owned by the relational store.
///
/// `quantity` never goes below zero in a committed state and `version`
/// increases by one on every committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub product_name: String,
    pub quantity: i64,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    /// Creates a fresh record at version zero.
    pub fn new(id: StockId, product_name: impl Into<String>, quantity: i64) -> Self {
        Self {
            id,
            product_name: product_name.into(),
            quantity,
            version: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Row lock mode for [`read_for_update`](crate::storage::StockTransaction::read_for_update).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Other readers proceed, writers wait until the transaction ends.
    SharedRead,
    /// All other lockers and writers of the row wait until the transaction ends.
    ExclusiveWrite,
}

/// Successful result of a decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decremented {
    pub stock_id: StockId,
    pub amount: i64,
    /// Quantity left after this decrement was applied.
    pub remaining: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stock_starts_at_version_zero() {
        let stock = Stock::new(1, "keyboard", 100);
        assert_eq!(stock.id, 1);
        assert_eq!(stock.product_name, "keyboard");
        assert_eq!(stock.quantity, 100);
        assert_eq!(stock.version, 0);
    }

    #[test]
    fn test_stock_serializes_to_json() {
        let stock = Stock::new(3, "mouse", 5);
        let json = serde_json::to_value(&stock).unwrap();
        assert_eq!(json["product_name"], "mouse");
        assert_eq!(json["quantity"], 5);
        assert_eq!(json["version"], 0);
    }
}

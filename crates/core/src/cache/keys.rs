use crate::stock::StockId;

/// Prefix of the cache keys mirroring stock quantities.
pub const QUANTITY_PREFIX: &str = "stock:quantity:";

/// Prefix of the distributed decrement lock keys.
pub const LOCK_PREFIX: &str = "stock:lock:";

/// Prefix of the cache synchronization lock keys.
pub const SYNC_LOCK_PREFIX: &str = "sync:lock:";

/// Returns the cache key holding the mirrored quantity of a stock.
pub fn quantity_key(stock_id: StockId) -> String {
    format!("{QUANTITY_PREFIX}{stock_id}")
}

/// Returns the distributed lock key guarding decrements of a stock.
pub fn lock_key(stock_id: StockId) -> String {
    format!("{LOCK_PREFIX}{stock_id}")
}

/// Returns the lock key guarding store-to-cache synchronization of a stock.
pub fn sync_lock_key(stock_id: StockId) -> String {
    format!("{SYNC_LOCK_PREFIX}{stock_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_key() {
        assert_eq!(quantity_key(1), "stock:quantity:1");
    }

    #[test]
    fn test_lock_key() {
        assert_eq!(lock_key(1), "stock:lock:1");
    }

    #[test]
    fn test_sync_lock_key() {
        assert_eq!(sync_lock_key(1), "sync:lock:1");
    }

    #[test]
    fn test_namespaces_are_disjoint() {
        let prefixes = [QUANTITY_PREFIX, LOCK_PREFIX, SYNC_LOCK_PREFIX];
        for (i, a) in prefixes.iter().enumerate() {
            for (j, b) in prefixes.iter().enumerate() {
                if i != j {
                    assert!(!a.starts_with(b), "{a} overlaps {b}");
                }
            }
        }

        // Clearing the mirror by prefix must never touch a lock.
        assert!(!lock_key(7).starts_with(QUANTITY_PREFIX));
        assert!(!sync_lock_key(7).starts_with(QUANTITY_PREFIX));
    }
}

use chrono::Utc;

use super::{Stock, StockError};

/// Rejects non-positive decrement amounts.
pub fn validate_amount(amount: i64) -> Result<(), StockError> {
    if amount <= 0 {
        return Err(StockError::InvalidAmount(amount));
    }
    Ok(())
}

/// Rejects negative quantities on create and reset.
pub fn validate_quantity(quantity: i64) -> Result<(), StockError> {
    if quantity < 0 {
        return Err(StockError::InvalidQuantity(quantity));
    }
    Ok(())
}

/// Checks that `stock` holds at least `amount`.
pub fn ensure_available(stock: &Stock, amount: i64) -> Result<(), StockError> {
    if stock.quantity < amount {
        return Err(StockError::InsufficientQuantity {
            id: stock.id,
            available: stock.quantity,
            requested: amount,
        });
    }
    Ok(())
}

/// Returns the record with `amount` taken off its quantity.
///
/// The version is left untouched; the store bumps it when the write commits.
pub fn apply_decrement(stock: &Stock, amount: i64) -> Result<Stock, StockError> {
    validate_amount(amount)?;
    ensure_available(stock, amount)?;

    Ok(Stock {
        quantity: stock.quantity - amount,
        updated_at: Utc::now(),
        ..stock.clone()
    })
}

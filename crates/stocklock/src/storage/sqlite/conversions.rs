//! SQLite row conversion functions.
//!
//! Pure functions for converting between SQLite rows and domain types.

use chrono::{DateTime, Utc};
use rusqlite::Row;

use stocklock_core::stock::Stock;

/// Convert a SQLite row to a Stock.
///
/// Expected columns: id, product_name, quantity, version, updated_at
pub fn row_to_stock(row: &Row) -> rusqlite::Result<Stock> {
    let id: i64 = row.get(0)?;
    let product_name: String = row.get(1)?;
    let quantity: i64 = row.get(2)?;
    let version: i64 = row.get(3)?;
    let updated_at: String = row.get(4)?;

    Ok(Stock {
        id,
        product_name,
        quantity,
        version,
        updated_at: parse_datetime(&updated_at)?,
    })
}

/// Parse an RFC 3339 timestamp.
fn parse_datetime(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Format a DateTime for SQLite storage (RFC 3339).
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

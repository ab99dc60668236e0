//! SQLite schema definitions and SQL query constants.
//!
//! Pure data, no I/O.

/// Journal mode of every connection. WAL lets readers run beside the writer.
pub const JOURNAL_MODE: &str = "WAL";

/// Durability level paired with WAL.
pub const SYNCHRONOUS: &str = "NORMAL";

/// SQL statement to create the stock table.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS stock (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_name TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 0),
    version INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
"#;

// Transaction control
pub const BEGIN_DEFERRED: &str = "BEGIN DEFERRED";
pub const BEGIN_IMMEDIATE: &str = "BEGIN IMMEDIATE";
pub const COMMIT: &str = "COMMIT";

// Stock queries
pub const INSERT_STOCK: &str = r#"
INSERT INTO stock (product_name, quantity, version, updated_at)
VALUES (?1, ?2, 0, ?3)
"#;

pub const SELECT_STOCK_BY_ID: &str = r#"
SELECT id, product_name, quantity, version, updated_at
FROM stock
WHERE id = ?1
"#;

pub const UPDATE_STOCK: &str = r#"
UPDATE stock
SET product_name = ?2, quantity = ?3, version = version + 1, updated_at = ?4
WHERE id = ?1
"#;

pub const UPDATE_STOCK_IF_VERSION: &str = r#"
UPDATE stock
SET product_name = ?2, quantity = ?3, version = version + 1, updated_at = ?4
WHERE id = ?1 AND version = ?5
"#;

pub const DECREMENT_IF_SUFFICIENT: &str = r#"
UPDATE stock
SET quantity = quantity - ?2, version = version + 1, updated_at = ?3
WHERE id = ?1 AND quantity >= ?2
"#;

pub const RESET_QUANTITY: &str = r#"
UPDATE stock
SET quantity = ?2, version = version + 1, updated_at = ?3
WHERE id = ?1
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_valid_sql() {
        assert!(CREATE_TABLES.contains("CREATE TABLE IF NOT EXISTS stock"));
        assert!(CREATE_TABLES.contains("CHECK (quantity >= 0)"));
    }

    #[test]
    fn test_writes_bump_version() {
        for sql in [
            UPDATE_STOCK,
            UPDATE_STOCK_IF_VERSION,
            DECREMENT_IF_SUFFICIENT,
            RESET_QUANTITY,
        ] {
            assert!(sql.contains("version = version + 1"), "{sql}");
        }
    }

    #[test]
    fn test_conditional_statements_guard_their_precondition() {
        assert!(UPDATE_STOCK_IF_VERSION.contains("AND version = ?5"));
        assert!(DECREMENT_IF_SUFFICIENT.contains("AND quantity >= ?2"));
    }
}

//! Helpers shared by the SQLite repositories.

use std::str::FromStr;

use eqindex_core::errors::{DatabaseError, Error, Result};
use rust_decimal::Decimal;

/// Rows per statement for batched inserts and `IN (...)` lookups.
///
/// Keeps every statement well under SQLite's bound-parameter limit.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Splits a slice into chunks of at most `SQLITE_MAX_PARAMS_CHUNK` items.
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

/// Parses a decimal text column. Values are written with `Decimal::to_string`
/// and must read back exactly.
pub fn parse_decimal(column: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| {
        Error::Database(DatabaseError::CorruptValue(format!(
            "{} holds '{}': {}",
            column, raw, e
        )))
    })
}

pub fn parse_optional_decimal(column: &str, raw: Option<&str>) -> Result<Option<Decimal>> {
    raw.map(|value| parse_decimal(column, value)).transpose()
}

/// `top_n` as stored in INTEGER columns.
pub fn top_n_to_db(top_n: u32) -> Result<i32> {
    i32::try_from(top_n).map_err(|_| {
        Error::Database(DatabaseError::CorruptValue(format!(
            "top_n {} does not fit an INTEGER column",
            top_n
        )))
    })
}

pub fn top_n_from_db(top_n: i32) -> Result<u32> {
    u32::try_from(top_n).map_err(|_| {
        Error::Database(DatabaseError::CorruptValue(format!(
            "negative top_n {} in storage",
            top_n
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_chunk_for_sqlite_empty() {
        let items: Vec<i32> = vec![];
        assert_eq!(chunk_for_sqlite(&items).count(), 0);
    }

    #[test]
    fn test_chunk_for_sqlite_over_limit() {
        let items: Vec<i32> = (0..1200).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), SQLITE_MAX_PARAMS_CHUNK);
        assert_eq!(chunks[2].len(), 200);
    }

    #[test]
    fn test_decimal_text_reads_back_exactly() {
        let value = dec!(1000) / dec!(3);
        assert_eq!(parse_decimal("nav", &value.to_string()).unwrap(), value);
        assert!(parse_decimal("nav", "12,5").is_err());
        assert_eq!(parse_optional_decimal("market_cap", None).unwrap(), None);
    }

    #[test]
    fn test_top_n_bounds() {
        assert_eq!(top_n_to_db(100).unwrap(), 100);
        assert!(top_n_to_db(u32::MAX).is_err());
        assert!(top_n_from_db(-1).is_err());
    }
}

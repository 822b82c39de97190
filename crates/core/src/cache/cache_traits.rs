use std::fmt;

use chrono::NaiveDate;
use serde_json::Value;

/// Key of a cached accessor result, one variant per accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Performance {
        start: NaiveDate,
        end: NaiveDate,
        top_n: u32,
    },
    Composition {
        date: NaiveDate,
        top_n: u32,
    },
    CompositionChanges {
        start: NaiveDate,
        end: NaiveDate,
        top_n: u32,
    },
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Performance { start, end, top_n } => {
                write!(f, "perf:{}:{}:{}", start, end, top_n)
            }
            CacheKey::Composition { date, top_n } => write!(f, "comp:{}:{}", date, top_n),
            CacheKey::CompositionChanges { start, end, top_n } => {
                write!(f, "changes:{}:{}:{}", start, end, top_n)
            }
        }
    }
}

/// Cache of serialized accessor results.
///
/// Values are JSON so one store serves every result type.
pub trait IndexCacheTrait: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value);

    fn clear(&self);
}

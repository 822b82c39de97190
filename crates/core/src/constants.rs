/// Number of calendar days INIT searches backward from `start - 1`
pub const INIT_LOOKBACK_DAYS: u32 = 10;

/// Default index size
pub const DEFAULT_TOP_N: u32 = 100;

/// Largest accepted index size
pub const MAX_TOP_N: u32 = 500;

/// Default starting NAV of a construction run
pub const DEFAULT_INITIAL_NAV: &str = "1000";

/// Decimal precision for display
pub const DISPLAY_DECIMAL_PRECISION: u32 = 2;

/// Processed-day interval between progress log lines
pub const PROGRESS_LOG_INTERVAL: usize = 7;

/// Storage format for dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

//! eqindex Core - Domain entities, services, and traits.
//!
//! This crate contains the index construction engine: Top-N selection,
//! valuation, reconstitution and the day-by-day construction loop.
//! It is database-agnostic and defines traits that are implemented
//! by the `storage-sqlite` crate.

pub mod cache;
pub mod constants;
pub mod errors;
pub mod index;
pub mod market_data;
pub mod utils;

// Re-export common types from the index and market data modules
pub use index::*;
pub use market_data::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;

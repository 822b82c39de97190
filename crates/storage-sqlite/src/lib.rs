//! SQLite storage implementation for the eqindex engine.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the repository traits defined in `eqindex-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The single-connection writer actor
//! - Repository implementations for observations and index records
//!
//! # Architecture
//!
//! This crate is the only place where Diesel dependencies exist. The core
//! crate is database-agnostic and works with traits.
//!
//! ```text
//!        core (domain)
//!              │
//!              ▼
//!   storage-sqlite (this crate)
//!              │
//!              ▼
//!          SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod index;
pub mod market_data;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

// Re-export repositories
pub use index::IndexRepository;
pub use market_data::ObservationRepository;

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from eqindex-core for convenience
pub use eqindex_core::errors::{DatabaseError, Error, Result};

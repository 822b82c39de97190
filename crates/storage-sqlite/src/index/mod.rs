//! SQLite storage for index snapshots, performance, changes and runs.

mod model;
mod repository;

pub use model::{
    CompositionChangeDB, IndexHoldingDB, IndexPerformanceDB, IndexPortfolioDB, IndexRunDB,
};
pub use repository::IndexRepository;

// Re-export trait from core for convenience
pub use eqindex_core::index::IndexRepositoryTrait;

//! SQLite storage for daily stock observations.

mod model;
mod repository;

pub use model::StockObservationDB;
pub use repository::ObservationRepository;

// Re-export trait from core for convenience
pub use eqindex_core::market_data::ObservationRepositoryTrait;

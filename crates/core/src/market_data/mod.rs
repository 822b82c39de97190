//! Market data module - stock observations and the observation store contract.

mod market_data_model;
mod market_data_traits;

pub use market_data_model::{InstrumentKey, QualifiedObservation, StockObservation};
pub use market_data_traits::ObservationRepositoryTrait;

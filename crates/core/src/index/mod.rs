//! Index module - Top-N selection, valuation, reconstitution and the
//! construction engine that ties them together day by day.

mod cancellation;
mod construction_engine;
mod construction_state;
mod index_errors;
mod index_model;
mod index_query_model;
mod index_service;
mod index_traits;
pub mod rebalance;
pub mod selector;
pub mod valuation;

pub use cancellation::CancellationFlag;
pub use construction_engine::IndexConstructionEngine;
pub use construction_state::ConstructionState;
pub use index_errors::IndexError;
pub use index_model::*;
pub use index_query_model::*;
pub use index_service::IndexService;
pub use index_traits::{IndexRepositoryTrait, IndexServiceTrait};
pub use rebalance::{equal_weight, rebalance, reconstitute, RebalanceOutcome, Reconstitution};
pub use selector::{rank_observations, select_top_n, TopNSelector};
pub use valuation::{percent_change, value_holdings, Valuation};

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod construction_engine_tests;

//! Observation store contract.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{InstrumentKey, StockObservation};
use crate::errors::Result;

/// Read-only access to daily stock observations.
///
/// Reads are async so that the two independent lookups of a construction
/// day can be issued concurrently.
#[async_trait]
pub trait ObservationRepositoryTrait: Send + Sync {
    /// Observations for `date` ranked by market cap descending, at most `n`.
    /// Stores should pre-filter to qualifying observations; callers re-check.
    async fn top_n_by_market_cap(&self, date: NaiveDate, n: usize)
        -> Result<Vec<StockObservation>>;

    /// A single observation, if recorded.
    async fn get_observation(
        &self,
        symbol: &str,
        exchange: &str,
        date: NaiveDate,
    ) -> Result<Option<StockObservation>>;

    /// Observations on `date` for the given instruments. Missing instruments
    /// are simply absent from the result.
    async fn get_observations(
        &self,
        keys: &[InstrumentKey],
        date: NaiveDate,
    ) -> Result<Vec<StockObservation>>;
}

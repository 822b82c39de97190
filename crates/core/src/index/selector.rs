//! Top-N constituent selection.
//!
//! Candidates are ranked by market cap descending. Ties are broken by
//! symbol, then exchange, so the ranking is a total order and the same
//! inputs always select the same constituents in the same order.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::NaiveDate;
use log::debug;

use super::IndexError;
use crate::errors::Result;
use crate::market_data::{ObservationRepositoryTrait, QualifiedObservation, StockObservation};

pub fn compare_by_market_cap(a: &QualifiedObservation, b: &QualifiedObservation) -> Ordering {
    b.market_cap
        .cmp(&a.market_cap)
        .then_with(|| a.symbol.cmp(&b.symbol))
        .then_with(|| a.exchange.cmp(&b.exchange))
}

/// Qualifying observations of `date`, best first.
pub fn rank_observations<'a, I>(date: NaiveDate, observations: I) -> Vec<QualifiedObservation>
where
    I: IntoIterator<Item = &'a StockObservation>,
{
    let mut ranked: Vec<QualifiedObservation> = observations
        .into_iter()
        .filter(|obs| obs.date == date)
        .filter_map(StockObservation::qualify)
        .collect();
    ranked.sort_by(compare_by_market_cap);
    ranked
}

/// Keeps the first `n` of an already ranked list, failing when fewer exist.
pub fn require_top_n(
    date: NaiveDate,
    n: usize,
    mut ranked: Vec<QualifiedObservation>,
) -> std::result::Result<Vec<QualifiedObservation>, IndexError> {
    if ranked.len() < n {
        return Err(IndexError::NoTradingData {
            date,
            found: ranked.len(),
            required: n,
        });
    }
    ranked.truncate(n);
    Ok(ranked)
}

/// The top `n` qualifying observations of `date`.
pub fn select_top_n(
    date: NaiveDate,
    n: usize,
    observations: &[StockObservation],
) -> std::result::Result<Vec<QualifiedObservation>, IndexError> {
    require_top_n(date, n, rank_observations(date, observations))
}

/// Selector backed by the observation store.
#[derive(Clone)]
pub struct TopNSelector {
    observations: Arc<dyn ObservationRepositoryTrait>,
}

impl TopNSelector {
    pub fn new(observations: Arc<dyn ObservationRepositoryTrait>) -> Self {
        Self { observations }
    }

    /// Up to `n` ranked candidates. Fewer than `n` is not an error here.
    pub async fn rank(&self, date: NaiveDate, n: usize) -> Result<Vec<QualifiedObservation>> {
        let observations = self.observations.top_n_by_market_cap(date, n).await?;
        let mut ranked = rank_observations(date, &observations);
        ranked.truncate(n);
        debug!("Ranked {} candidates for {} (n = {})", ranked.len(), date, n);
        Ok(ranked)
    }

    /// Exactly `n` ranked candidates or `IndexError::NoTradingData`.
    pub async fn select(&self, date: NaiveDate, n: usize) -> Result<Vec<QualifiedObservation>> {
        let ranked = self.rank(date, n).await?;
        Ok(require_top_n(date, n, ranked)?)
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use log::debug;

use super::model::StockObservationDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::stock_observations;
use crate::schema::stock_observations::dsl::*;
use crate::utils::chunk_for_sqlite;
use eqindex_core::errors::{Error, Result};
use eqindex_core::index::rank_observations;
use eqindex_core::market_data::{InstrumentKey, ObservationRepositoryTrait, StockObservation};

/// Observation store on SQLite.
///
/// Reads run on the blocking pool so the engine's two per-day lookups can
/// proceed in parallel on separate pooled connections.
pub struct ObservationRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ObservationRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    async fn read<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = get_connection(&pool)?;
            query(&mut conn)
        })
        .await
        .map_err(|e| Error::Unexpected(format!("observation read task failed: {}", e)))?
    }

    /// Inserts or replaces observations keyed by (symbol, exchange, date).
    pub async fn upsert_observations(&self, observations: &[StockObservation]) -> Result<usize> {
        if observations.is_empty() {
            return Ok(0);
        }
        let rows: Vec<StockObservationDB> =
            observations.iter().map(StockObservationDB::from).collect();

        self.writer
            .exec(move |conn| {
                let mut written = 0;
                for chunk in chunk_for_sqlite(&rows) {
                    written += diesel::replace_into(stock_observations::table)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(written)
            })
            .await
    }
}

fn to_domain(rows: Vec<StockObservationDB>) -> Result<Vec<StockObservation>> {
    rows.into_iter().map(StockObservation::try_from).collect()
}

#[async_trait]
impl ObservationRepositoryTrait for ObservationRepository {
    async fn top_n_by_market_cap(
        &self,
        date: NaiveDate,
        n: usize,
    ) -> Result<Vec<StockObservation>> {
        self.read(move |conn| {
            // Decimal text does not sort numerically in SQL; rank after decoding.
            let rows = stock_observations::table
                .filter(observation_date.eq(date))
                .filter(close_price.is_not_null())
                .filter(market_cap.is_not_null())
                .select(StockObservationDB::as_select())
                .load::<StockObservationDB>(conn)
                .map_err(StorageError::from)?;
            let observations = to_domain(rows)?;
            let ranked: Vec<StockObservation> = rank_observations(date, &observations)
                .into_iter()
                .take(n)
                .map(StockObservation::from)
                .collect();
            debug!(
                "{} of {} observations on {} qualify for top {}",
                ranked.len(),
                observations.len(),
                date,
                n
            );
            Ok(ranked)
        })
        .await
    }

    async fn get_observation(
        &self,
        input_symbol: &str,
        input_exchange: &str,
        date: NaiveDate,
    ) -> Result<Option<StockObservation>> {
        let input_symbol = input_symbol.to_string();
        let input_exchange = input_exchange.to_string();
        self.read(move |conn| {
            stock_observations::table
                .find((input_symbol, input_exchange, date))
                .select(StockObservationDB::as_select())
                .first::<StockObservationDB>(conn)
                .optional()
                .map_err(StorageError::from)?
                .map(StockObservation::try_from)
                .transpose()
        })
        .await
    }

    async fn get_observations(
        &self,
        keys: &[InstrumentKey],
        date: NaiveDate,
    ) -> Result<Vec<StockObservation>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let keys = keys.to_vec();
        self.read(move |conn| {
            let mut found = Vec::with_capacity(keys.len());
            for chunk in chunk_for_sqlite(&keys) {
                let symbols: Vec<&str> = chunk.iter().map(|k| k.symbol.as_str()).collect();
                let rows = stock_observations::table
                    .filter(observation_date.eq(date))
                    .filter(symbol.eq_any(symbols))
                    .select(StockObservationDB::as_select())
                    .load::<StockObservationDB>(conn)
                    .map_err(StorageError::from)?;
                // Symbol alone may match listings on other exchanges.
                found.extend(rows.into_iter().filter(|row| {
                    chunk
                        .iter()
                        .any(|k| k.symbol == row.symbol && k.exchange == row.exchange)
                }));
            }
            to_domain(found)
        })
        .await
    }
}

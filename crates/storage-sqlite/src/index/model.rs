//! Database models for the index tables.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::{parse_decimal, top_n_from_db, top_n_to_db};
use eqindex_core::errors::{Error, Result};
use eqindex_core::index::{
    CompositionChange, ConstructionRun, Holding, PerformanceRecord, Portfolio,
};

#[derive(Queryable, Selectable, Insertable, PartialEq, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::index_portfolios)]
#[diesel(primary_key(portfolio_date, top_n))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct IndexPortfolioDB {
    pub portfolio_date: NaiveDate,
    pub top_n: i32,
    pub nav: String,
}

/// One holding row. `position` keeps the rank order of the snapshot.
#[derive(Queryable, Selectable, Insertable, PartialEq, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::index_holdings)]
#[diesel(primary_key(portfolio_date, top_n, symbol, exchange))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct IndexHoldingDB {
    pub portfolio_date: NaiveDate,
    pub top_n: i32,
    pub symbol: String,
    pub exchange: String,
    pub position: i32,
    pub shares: String,
    pub reference_weight: String,
    pub close_price: String,
    pub market_cap: String,
}

#[derive(Queryable, Selectable, Insertable, PartialEq, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::index_performance)]
#[diesel(primary_key(performance_date, top_n))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct IndexPerformanceDB {
    pub performance_date: NaiveDate,
    pub top_n: i32,
    pub nav: String,
    pub daily_return_pct: String,
    pub cumulative_return_pct: String,
}

#[derive(Queryable, Selectable, Insertable, PartialEq, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::composition_changes)]
#[diesel(primary_key(change_date, top_n, symbol, exchange, change_type))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct CompositionChangeDB {
    pub change_date: NaiveDate,
    pub top_n: i32,
    pub symbol: String,
    pub exchange: String,
    pub change_type: String,
    pub market_cap: String,
    pub position: i32,
}

#[derive(
    Queryable, Selectable, Insertable, AsChangeset, PartialEq, Serialize, Deserialize, Debug, Clone,
)]
#[diesel(table_name = crate::schema::index_runs)]
#[diesel(primary_key(top_n))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct IndexRunDB {
    pub top_n: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub base_date: NaiveDate,
    pub base_nav: String,
    pub last_processed_date: Option<NaiveDate>,
    pub state: String,
    pub updated_at: String,
}

impl IndexPortfolioDB {
    /// Splits a snapshot into its portfolio row and holding rows.
    pub fn from_domain(portfolio: &Portfolio) -> Result<(Self, Vec<IndexHoldingDB>)> {
        let top_n = top_n_to_db(portfolio.top_n)?;
        let holdings = portfolio
            .holdings
            .iter()
            .enumerate()
            .map(|(position, h)| {
                Ok(IndexHoldingDB {
                    portfolio_date: portfolio.date,
                    top_n,
                    symbol: h.symbol.clone(),
                    exchange: h.exchange.clone(),
                    position: i32::try_from(position)
                        .map_err(|e| Error::Unexpected(e.to_string()))?,
                    shares: h.shares.to_string(),
                    reference_weight: h.reference_weight.to_string(),
                    close_price: h.close_price.to_string(),
                    market_cap: h.market_cap.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((
            Self {
                portfolio_date: portfolio.date,
                top_n,
                nav: portfolio.nav.to_string(),
            },
            holdings,
        ))
    }

    /// Reassembles a snapshot. `holdings` must already be in position order.
    pub fn into_domain(self, holdings: Vec<IndexHoldingDB>) -> Result<Portfolio> {
        Ok(Portfolio {
            date: self.portfolio_date,
            top_n: top_n_from_db(self.top_n)?,
            nav: parse_decimal("index_portfolios.nav", &self.nav)?,
            holdings: holdings
                .into_iter()
                .map(Holding::try_from)
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

impl TryFrom<IndexHoldingDB> for Holding {
    type Error = Error;

    fn try_from(db: IndexHoldingDB) -> Result<Self> {
        Ok(Self {
            shares: parse_decimal("index_holdings.shares", &db.shares)?,
            reference_weight: parse_decimal("index_holdings.reference_weight", &db.reference_weight)?,
            close_price: parse_decimal("index_holdings.close_price", &db.close_price)?,
            market_cap: parse_decimal("index_holdings.market_cap", &db.market_cap)?,
            symbol: db.symbol,
            exchange: db.exchange,
        })
    }
}

impl TryFrom<&PerformanceRecord> for IndexPerformanceDB {
    type Error = Error;

    fn try_from(domain: &PerformanceRecord) -> Result<Self> {
        Ok(Self {
            performance_date: domain.date,
            top_n: top_n_to_db(domain.top_n)?,
            nav: domain.nav.to_string(),
            daily_return_pct: domain.daily_return_pct.to_string(),
            cumulative_return_pct: domain.cumulative_return_pct.to_string(),
        })
    }
}

impl TryFrom<IndexPerformanceDB> for PerformanceRecord {
    type Error = Error;

    fn try_from(db: IndexPerformanceDB) -> Result<Self> {
        Ok(Self {
            date: db.performance_date,
            top_n: top_n_from_db(db.top_n)?,
            nav: parse_decimal("index_performance.nav", &db.nav)?,
            daily_return_pct: parse_decimal("index_performance.daily_return_pct", &db.daily_return_pct)?,
            cumulative_return_pct: parse_decimal(
                "index_performance.cumulative_return_pct",
                &db.cumulative_return_pct,
            )?,
        })
    }
}

impl CompositionChangeDB {
    pub fn from_domain(change: &CompositionChange, position: usize) -> Result<Self> {
        Ok(Self {
            change_date: change.date,
            top_n: top_n_to_db(change.top_n)?,
            symbol: change.symbol.clone(),
            exchange: change.exchange.clone(),
            change_type: change.change_type.as_str().to_string(),
            market_cap: change.market_cap.to_string(),
            position: i32::try_from(position).map_err(|e| Error::Unexpected(e.to_string()))?,
        })
    }
}

impl TryFrom<CompositionChangeDB> for CompositionChange {
    type Error = Error;

    fn try_from(db: CompositionChangeDB) -> Result<Self> {
        Ok(Self {
            date: db.change_date,
            top_n: top_n_from_db(db.top_n)?,
            change_type: db.change_type.parse()?,
            market_cap: parse_decimal("composition_changes.market_cap", &db.market_cap)?,
            symbol: db.symbol,
            exchange: db.exchange,
        })
    }
}

impl TryFrom<&ConstructionRun> for IndexRunDB {
    type Error = Error;

    fn try_from(run: &ConstructionRun) -> Result<Self> {
        Ok(Self {
            top_n: top_n_to_db(run.top_n)?,
            start_date: run.start_date,
            end_date: run.end_date,
            base_date: run.base_date,
            base_nav: run.base_nav.to_string(),
            last_processed_date: run.last_processed_date,
            state: run.state.as_str().to_string(),
            updated_at: Utc::now().format("%Y-%m-%dT%H:%M:%S%.fZ").to_string(),
        })
    }
}

impl TryFrom<IndexRunDB> for ConstructionRun {
    type Error = Error;

    fn try_from(db: IndexRunDB) -> Result<Self> {
        Ok(Self {
            top_n: top_n_from_db(db.top_n)?,
            start_date: db.start_date,
            end_date: db.end_date,
            base_date: db.base_date,
            base_nav: parse_decimal("index_runs.base_nav", &db.base_nav)?,
            last_processed_date: db.last_processed_date,
            state: db.state.parse()?,
        })
    }
}

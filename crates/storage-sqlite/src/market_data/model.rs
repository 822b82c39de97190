//! Database model for stock observations.

use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::parse_optional_decimal;
use eqindex_core::errors::{Error, Result};
use eqindex_core::market_data::StockObservation;

#[derive(
    Queryable, Selectable, Insertable, AsChangeset, PartialEq, Serialize, Deserialize, Debug, Clone,
)]
#[diesel(table_name = crate::schema::stock_observations)]
#[diesel(primary_key(symbol, exchange, observation_date))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct StockObservationDB {
    pub symbol: String,
    pub exchange: String,
    pub observation_date: NaiveDate,
    pub close_price: Option<String>,
    pub market_cap: Option<String>,
}

impl TryFrom<StockObservationDB> for StockObservation {
    type Error = Error;

    fn try_from(db: StockObservationDB) -> Result<Self> {
        Ok(Self {
            close_price: parse_optional_decimal("close_price", db.close_price.as_deref())?,
            market_cap: parse_optional_decimal("market_cap", db.market_cap.as_deref())?,
            symbol: db.symbol,
            exchange: db.exchange,
            date: db.observation_date,
        })
    }
}

impl From<&StockObservation> for StockObservationDB {
    fn from(domain: &StockObservation) -> Self {
        Self {
            symbol: domain.symbol.clone(),
            exchange: domain.exchange.clone(),
            observation_date: domain.date,
            close_price: domain.close_price.map(|v| v.to_string()),
            market_cap: domain.market_cap.map(|v| v.to_string()),
        }
    }
}

//! Stock observation domain models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a listed instrument: a symbol on an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentKey {
    pub symbol: String,
    pub exchange: String,
}

impl InstrumentKey {
    pub fn new(symbol: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
        }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

/// A raw daily price and market-cap fact, keyed by (symbol, exchange, date).
///
/// Either value may be missing in the source data. Only observations that
/// pass [`StockObservation::qualify`] take part in ranking or valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockObservation {
    pub symbol: String,
    pub exchange: String,
    pub date: NaiveDate,
    pub close_price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
}

impl StockObservation {
    pub fn key(&self) -> InstrumentKey {
        InstrumentKey::new(self.symbol.clone(), self.exchange.clone())
    }

    /// Returns the observation with both values present and a positive close,
    /// or `None` if it must be excluded.
    pub fn qualify(&self) -> Option<QualifiedObservation> {
        match (self.close_price, self.market_cap) {
            (Some(close_price), Some(market_cap)) if close_price > Decimal::ZERO => {
                Some(QualifiedObservation {
                    symbol: self.symbol.clone(),
                    exchange: self.exchange.clone(),
                    date: self.date,
                    close_price,
                    market_cap,
                })
            }
            _ => None,
        }
    }
}

/// An observation usable for ranking and valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifiedObservation {
    pub symbol: String,
    pub exchange: String,
    pub date: NaiveDate,
    pub close_price: Decimal,
    pub market_cap: Decimal,
}

impl QualifiedObservation {
    pub fn key(&self) -> InstrumentKey {
        InstrumentKey::new(self.symbol.clone(), self.exchange.clone())
    }
}

impl From<QualifiedObservation> for StockObservation {
    fn from(obs: QualifiedObservation) -> Self {
        StockObservation {
            symbol: obs.symbol,
            exchange: obs.exchange,
            date: obs.date,
            close_price: Some(obs.close_price),
            market_cap: Some(obs.market_cap),
        }
    }
}

//! Index construction domain models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ConstructionState, IndexError};
use crate::constants::{INIT_LOOKBACK_DAYS, MAX_TOP_N};
use crate::market_data::{InstrumentKey, QualifiedObservation};

/// A position of the index.
///
/// `shares` is fixed at the last rebalance. `close_price` and `market_cap`
/// are the marks of the snapshot date and move every trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    pub exchange: String,
    pub shares: Decimal,
    pub reference_weight: Decimal,
    pub close_price: Decimal,
    pub market_cap: Decimal,
}

impl Holding {
    pub fn key(&self) -> InstrumentKey {
        InstrumentKey::new(self.symbol.clone(), self.exchange.clone())
    }

    pub fn notional_value(&self) -> Decimal {
        self.shares * self.close_price
    }

    /// The same share count marked to a newer observation.
    pub fn marked_to(&self, observation: &QualifiedObservation) -> Holding {
        Holding {
            close_price: observation.close_price,
            market_cap: observation.market_cap,
            ..self.clone()
        }
    }
}

/// Immutable index snapshot for one (date, top_n).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub date: NaiveDate,
    pub top_n: u32,
    pub holdings: Vec<Holding>,
    pub nav: Decimal,
}

impl Portfolio {
    pub fn keys(&self) -> Vec<InstrumentKey> {
        self.holdings.iter().map(Holding::key).collect()
    }
}

/// Daily NAV and returns of the index, one per (date, top_n).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub date: NaiveDate,
    pub top_n: u32,
    pub nav: Decimal,
    pub daily_return_pct: Decimal,
    pub cumulative_return_pct: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Enter,
    Exit,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Enter => "ENTER",
            ChangeType::Exit => "EXIT",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENTER" => Ok(ChangeType::Enter),
            "EXIT" => Ok(ChangeType::Exit),
            other => Err(IndexError::InvalidRequest(format!(
                "unknown change type '{}'",
                other
            ))),
        }
    }
}

/// A membership change of the index on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionChange {
    pub date: NaiveDate,
    pub top_n: u32,
    pub symbol: String,
    pub exchange: String,
    pub change_type: ChangeType,
    pub market_cap: Decimal,
}

/// Everything a trading day writes. Persisted as one atomic unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecords {
    pub performance: PerformanceRecord,
    pub portfolio: Portfolio,
    pub changes: Vec<CompositionChange>,
    pub run: ConstructionRun,
}

/// Parameters of a construction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub top_n: u32,
    pub initial_nav: Decimal,
}

impl ConstructionRequest {
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.top_n == 0 || self.top_n > MAX_TOP_N {
            return Err(IndexError::InvalidRequest(format!(
                "top_n must be between 1 and {}, got {}",
                MAX_TOP_N, self.top_n
            )));
        }
        if self.initial_nav <= Decimal::ZERO {
            return Err(IndexError::InvalidRequest(format!(
                "initial_nav must be positive, got {}",
                self.initial_nav
            )));
        }
        if self.end_date < self.start_date {
            return Err(IndexError::InvalidRequest(format!(
                "end_date {} is before start_date {}",
                self.end_date, self.start_date
            )));
        }
        Ok(())
    }
}

/// Persistent progress of the construction of one index size.
///
/// `base_nav` anchors cumulative returns for the life of the run and
/// `last_processed_date` is where a resume continues from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionRun {
    pub top_n: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub base_date: NaiveDate,
    pub base_nav: Decimal,
    pub last_processed_date: Option<NaiveDate>,
    pub state: ConstructionState,
}

/// Outcome reported to the caller of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionSummary {
    pub top_n: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub base_date: NaiveDate,
    pub initial_nav: Decimal,
    pub final_nav: Decimal,
    pub total_return_pct: Decimal,
    pub days_processed: usize,
    pub state: ConstructionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Calendar days INIT may walk back from `start - 1`.
    pub init_lookback_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            init_lookback_days: INIT_LOOKBACK_DAYS,
        }
    }
}

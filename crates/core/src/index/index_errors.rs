use chrono::NaiveDate;
use thiserror::Error;

use super::ConstructionState;
use crate::errors::Error;
use crate::market_data::InstrumentKey;

/// Failures of the construction pipeline and its read accessors.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("No trading data on {date}: {found} qualifying observations, {required} required")]
    NoTradingData {
        date: NaiveDate,
        found: usize,
        required: usize,
    },

    #[error("Missing price for held instrument {key} on {date}")]
    MissingPrice { key: InstrumentKey, date: NaiveDate },

    #[error(
        "No trading day with {required} qualifying observations in the {lookback_days} days before {start_date}"
    )]
    NoInitialTradingDay {
        start_date: NaiveDate,
        lookback_days: u32,
        required: usize,
    },

    #[error("Construction halted on {date}: {source}")]
    Halted {
        date: NaiveDate,
        source: Box<Error>,
    },

    #[error("Construction of top {top_n} cancelled, last processed day: {last_processed:?}")]
    Cancelled {
        top_n: u32,
        last_processed: Option<NaiveDate>,
    },

    #[error("Construction of top {0} is already running")]
    AlreadyRunning(u32),

    #[error("Invalid construction request: {0}")]
    InvalidRequest(String),

    #[error("Invalid construction state transition from {from} to {to}")]
    InvalidTransition {
        from: ConstructionState,
        to: ConstructionState,
    },

    #[error("Calculation failed: {0}")]
    Calculation(String),

    #[error("No construction run recorded for top {0}")]
    RunNotFound(u32),

    #[error("{0}")]
    NotFound(String),
}

impl IndexError {
    /// Stable name of the variant, used when reporting halts.
    pub fn kind(&self) -> &'static str {
        match self {
            IndexError::NoTradingData { .. } => "NoTradingData",
            IndexError::MissingPrice { .. } => "MissingPrice",
            IndexError::NoInitialTradingDay { .. } => "NoInitialTradingDay",
            IndexError::Halted { .. } => "Halted",
            IndexError::Cancelled { .. } => "Cancelled",
            IndexError::AlreadyRunning(_) => "AlreadyRunning",
            IndexError::InvalidRequest(_) => "InvalidRequest",
            IndexError::InvalidTransition { .. } => "InvalidTransition",
            IndexError::Calculation(_) => "Calculation",
            IndexError::RunNotFound(_) => "RunNotFound",
            IndexError::NotFound(_) => "NotFound",
        }
    }
}

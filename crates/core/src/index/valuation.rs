//! Mark-to-market of a fixed share portfolio.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{Holding, IndexError};
use crate::market_data::{InstrumentKey, QualifiedObservation, StockObservation};

/// Holdings marked to one day's closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub date: NaiveDate,
    pub nav: Decimal,
    pub holdings: Vec<Holding>,
}

/// Values `holdings` at the closes of `date`.
///
/// Every holding needs a qualifying observation on `date`; the first one
/// without fails with `IndexError::MissingPrice`. A NAV beyond the decimal
/// range fails with `IndexError::Calculation`.
pub fn value_holdings(
    date: NaiveDate,
    holdings: &[Holding],
    observations: &[StockObservation],
) -> Result<Valuation, IndexError> {
    let marks: HashMap<InstrumentKey, QualifiedObservation> = observations
        .iter()
        .filter(|obs| obs.date == date)
        .filter_map(StockObservation::qualify)
        .map(|obs| (obs.key(), obs))
        .collect();

    let mut nav = Decimal::ZERO;
    let mut marked = Vec::with_capacity(holdings.len());
    for holding in holdings {
        let key = holding.key();
        let mark = marks
            .get(&key)
            .ok_or_else(|| IndexError::MissingPrice { key, date })?;
        let holding = holding.marked_to(mark);
        nav = holding
            .shares
            .checked_mul(holding.close_price)
            .and_then(|notional| nav.checked_add(notional))
            .ok_or_else(|| {
                IndexError::Calculation(format!(
                    "nav overflows valuing {} at {} on {}",
                    holding.key(),
                    holding.close_price,
                    date
                ))
            })?;
        marked.push(holding);
    }

    Ok(Valuation {
        date,
        nav,
        holdings: marked,
    })
}

/// Percent change from `from` to `to`. Zero when `from` is zero.
pub fn percent_change(from: Decimal, to: Decimal) -> Decimal {
    if from.is_zero() {
        return Decimal::ZERO;
    }
    (to - from) / from * Decimal::ONE_HUNDRED
}

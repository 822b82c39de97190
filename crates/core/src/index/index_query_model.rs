//! Read-side views returned by the index service accessors.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ChangeType, CompositionChange, PerformanceRecord, Portfolio};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_days: usize,
    pub starting_nav: Decimal,
    pub ending_nav: Decimal,
    pub total_return_pct: Decimal,
    pub average_daily_return_pct: Decimal,
    pub max_daily_return_pct: Decimal,
    pub min_daily_return_pct: Decimal,
}

impl PerformanceSummary {
    /// Summary of an ascending series. `None` for an empty one.
    ///
    /// Max and min only look at days that moved; a flat series reports zero.
    pub fn from_records(records: &[PerformanceRecord]) -> Option<Self> {
        let first = records.first()?;
        let last = records.last()?;

        let daily_sum: Decimal = records.iter().map(|r| r.daily_return_pct).sum();
        let moving = records
            .iter()
            .map(|r| r.daily_return_pct)
            .filter(|r| !r.is_zero());

        Some(Self {
            total_days: records.len(),
            starting_nav: first.nav,
            ending_nav: last.nav,
            total_return_pct: last.cumulative_return_pct,
            average_daily_return_pct: daily_sum / Decimal::from(records.len()),
            max_daily_return_pct: moving.clone().max().unwrap_or(Decimal::ZERO),
            min_daily_return_pct: moving.min().unwrap_or(Decimal::ZERO),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSeries {
    pub top_n: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub performance: Vec<PerformanceRecord>,
    pub summary: Option<PerformanceSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockComposition {
    pub symbol: String,
    pub exchange: String,
    pub market_cap: Decimal,
    pub close_price: Decimal,
    pub shares: Decimal,
    /// Share of the snapshot NAV held in this stock on the snapshot date.
    pub weight: Decimal,
    pub reference_weight: Decimal,
    pub notional_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionView {
    pub date: NaiveDate,
    pub top_n: u32,
    pub nav: Decimal,
    pub composition: Vec<StockComposition>,
    pub total_stocks: usize,
    pub total_market_cap: Decimal,
}

impl From<&Portfolio> for CompositionView {
    fn from(portfolio: &Portfolio) -> Self {
        let mut composition: Vec<StockComposition> = portfolio
            .holdings
            .iter()
            .map(|h| {
                let notional = h.notional_value();
                StockComposition {
                    symbol: h.symbol.clone(),
                    exchange: h.exchange.clone(),
                    market_cap: h.market_cap,
                    close_price: h.close_price,
                    shares: h.shares,
                    weight: if portfolio.nav.is_zero() {
                        Decimal::ZERO
                    } else {
                        notional / portfolio.nav
                    },
                    reference_weight: h.reference_weight,
                    notional_value: notional,
                }
            })
            .collect();
        composition.sort_by(|a, b| {
            b.market_cap
                .cmp(&a.market_cap)
                .then_with(|| a.symbol.cmp(&b.symbol))
                .then_with(|| a.exchange.cmp(&b.exchange))
        });

        Self {
            date: portfolio.date,
            top_n: portfolio.top_n,
            nav: portfolio.nav,
            total_stocks: composition.len(),
            total_market_cap: composition.iter().map(|c| c.market_cap).sum(),
            composition,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedStock {
    pub symbol: String,
    pub exchange: String,
    pub market_cap: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCompositionChange {
    pub date: NaiveDate,
    pub stocks_added: Vec<ChangedStock>,
    pub stocks_removed: Vec<ChangedStock>,
    pub num_added: usize,
    pub num_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionChanges {
    pub top_n: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub changes: Vec<DailyCompositionChange>,
    pub total_change_days: usize,
}

impl CompositionChanges {
    /// Groups change rows by date, ascending.
    pub fn group(
        top_n: u32,
        start_date: NaiveDate,
        end_date: NaiveDate,
        rows: &[CompositionChange],
    ) -> Self {
        let mut by_date: BTreeMap<NaiveDate, (Vec<ChangedStock>, Vec<ChangedStock>)> =
            BTreeMap::new();
        for row in rows {
            let (added, removed) = by_date.entry(row.date).or_default();
            let stock = ChangedStock {
                symbol: row.symbol.clone(),
                exchange: row.exchange.clone(),
                market_cap: row.market_cap,
            };
            match row.change_type {
                ChangeType::Enter => added.push(stock),
                ChangeType::Exit => removed.push(stock),
            }
        }

        let changes: Vec<DailyCompositionChange> = by_date
            .into_iter()
            .map(|(date, (stocks_added, stocks_removed))| DailyCompositionChange {
                date,
                num_added: stocks_added.len(),
                num_removed: stocks_removed.len(),
                stocks_added,
                stocks_removed,
            })
            .collect();

        Self {
            top_n,
            start_date,
            end_date,
            total_change_days: changes.len(),
            changes,
        }
    }
}

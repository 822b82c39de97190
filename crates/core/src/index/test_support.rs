//! In-memory stores shared by the index tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::selector::rank_observations;
use super::{
    CancellationFlag, ChangeType, CompositionChange, ConstructionRun, DayRecords,
    IndexRepositoryTrait, PerformanceRecord, Portfolio,
};
use crate::errors::{DatabaseError, Result};
use crate::market_data::{InstrumentKey, ObservationRepositoryTrait, StockObservation};

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn obs(symbol: &str, date: &str, close: Decimal, cap: Decimal) -> StockObservation {
    StockObservation {
        symbol: symbol.to_string(),
        exchange: "NYSE".to_string(),
        date: d(date),
        close_price: Some(close),
        market_cap: Some(cap),
    }
}

#[derive(Default)]
pub struct MockObservationRepository {
    rows: Mutex<Vec<StockObservation>>,
}

impl MockObservationRepository {
    pub fn new(rows: Vec<StockObservation>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn insert(&self, row: StockObservation) {
        self.rows.lock().unwrap().push(row);
    }
}

#[async_trait]
impl ObservationRepositoryTrait for MockObservationRepository {
    async fn top_n_by_market_cap(&self, date: NaiveDate, n: usize) -> Result<Vec<StockObservation>> {
        let rows = self.rows.lock().unwrap();
        Ok(rank_observations(date, rows.iter())
            .into_iter()
            .take(n)
            .map(StockObservation::from)
            .collect())
    }

    async fn get_observation(
        &self,
        symbol: &str,
        exchange: &str,
        date: NaiveDate,
    ) -> Result<Option<StockObservation>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.symbol == symbol && r.exchange == exchange && r.date == date)
            .cloned())
    }

    async fn get_observations(
        &self,
        keys: &[InstrumentKey],
        date: NaiveDate,
    ) -> Result<Vec<StockObservation>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| r.date == date && keys.contains(&r.key()))
            .cloned()
            .collect())
    }
}

type ChangeKey = (u32, NaiveDate, String, String, ChangeType);

/// Index store backed by ordered maps. Can trip a cancellation flag or
/// fail a commit at a chosen point.
#[derive(Default)]
pub struct MockIndexRepository {
    pub portfolios: Mutex<BTreeMap<(u32, NaiveDate), Portfolio>>,
    pub performance: Mutex<BTreeMap<(u32, NaiveDate), PerformanceRecord>>,
    pub changes: Mutex<BTreeMap<ChangeKey, CompositionChange>>,
    pub runs: Mutex<HashMap<u32, ConstructionRun>>,
    commits: AtomicUsize,
    cancel_after: Mutex<Option<(usize, CancellationFlag)>>,
    fail_commit_on: Mutex<Option<NaiveDate>>,
}

impl MockIndexRepository {
    pub fn cancel_after_commits(&self, commits: usize, flag: CancellationFlag) {
        *self.cancel_after.lock().unwrap() = Some((commits, flag));
    }

    pub fn fail_commit_on(&self, date: NaiveDate) {
        *self.fail_commit_on.lock().unwrap() = Some(date);
    }

    pub fn performance_rows(&self) -> Vec<PerformanceRecord> {
        self.performance.lock().unwrap().values().cloned().collect()
    }

    pub fn change_rows(&self) -> Vec<CompositionChange> {
        self.changes.lock().unwrap().values().cloned().collect()
    }

    pub fn portfolio_rows(&self) -> Vec<Portfolio> {
        self.portfolios.lock().unwrap().values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.portfolios.lock().unwrap().is_empty()
            && self.performance.lock().unwrap().is_empty()
            && self.changes.lock().unwrap().is_empty()
            && self.runs.lock().unwrap().is_empty()
    }

    fn put_change(&self, change: &CompositionChange) {
        self.changes.lock().unwrap().insert(
            (
                change.top_n,
                change.date,
                change.symbol.clone(),
                change.exchange.clone(),
                change.change_type,
            ),
            change.clone(),
        );
    }
}

#[async_trait]
impl IndexRepositoryTrait for MockIndexRepository {
    fn get_portfolio(&self, date: NaiveDate, top_n: u32) -> Result<Option<Portfolio>> {
        Ok(self.portfolios.lock().unwrap().get(&(top_n, date)).cloned())
    }

    fn get_latest_portfolio(&self, top_n: u32, on_or_before: NaiveDate) -> Result<Option<Portfolio>> {
        Ok(self
            .portfolios
            .lock()
            .unwrap()
            .range((top_n, NaiveDate::MIN)..=(top_n, on_or_before))
            .next_back()
            .map(|(_, p)| p.clone()))
    }

    fn get_performance(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        top_n: u32,
    ) -> Result<Vec<PerformanceRecord>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .performance
            .lock()
            .unwrap()
            .range((top_n, start)..=(top_n, end))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn get_composition_changes(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        top_n: u32,
    ) -> Result<Vec<CompositionChange>> {
        Ok(self
            .changes
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.top_n == top_n && c.date >= start && c.date <= end)
            .cloned()
            .collect())
    }

    fn get_run(&self, top_n: u32) -> Result<Option<ConstructionRun>> {
        Ok(self.runs.lock().unwrap().get(&top_n).cloned())
    }

    async fn upsert_portfolio(&self, portfolio: &Portfolio) -> Result<()> {
        self.portfolios
            .lock()
            .unwrap()
            .insert((portfolio.top_n, portfolio.date), portfolio.clone());
        Ok(())
    }

    async fn upsert_performance_record(&self, record: &PerformanceRecord) -> Result<()> {
        self.performance
            .lock()
            .unwrap()
            .insert((record.top_n, record.date), record.clone());
        Ok(())
    }

    async fn upsert_composition_change(&self, change: &CompositionChange) -> Result<()> {
        self.put_change(change);
        Ok(())
    }

    async fn begin_run(&self, run: &ConstructionRun, portfolio: &Portfolio) -> Result<()> {
        let top_n = run.top_n;
        self.portfolios.lock().unwrap().retain(|(n, _), _| *n != top_n);
        self.performance.lock().unwrap().retain(|(n, _), _| *n != top_n);
        self.changes.lock().unwrap().retain(|(n, ..), _| *n != top_n);
        self.upsert_portfolio(portfolio).await?;
        self.save_run(run).await
    }

    async fn save_run(&self, run: &ConstructionRun) -> Result<()> {
        self.runs.lock().unwrap().insert(run.top_n, run.clone());
        Ok(())
    }

    async fn commit_day(&self, day: &DayRecords) -> Result<()> {
        if *self.fail_commit_on.lock().unwrap() == Some(day.performance.date) {
            return Err(DatabaseError::TransactionFailed("disk full".to_string()).into());
        }

        let (top_n, date) = (day.performance.top_n, day.performance.date);
        self.changes
            .lock()
            .unwrap()
            .retain(|(n, d, _, _, _), _| !(*n == top_n && *d == date));
        for change in &day.changes {
            self.put_change(change);
        }
        self.upsert_performance_record(&day.performance).await?;
        self.upsert_portfolio(&day.portfolio).await?;
        self.save_run(&day.run).await?;

        let commits = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, flag)) = self.cancel_after.lock().unwrap().as_ref() {
            if commits >= *after {
                flag.cancel();
            }
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.portfolios.lock().unwrap().clear();
        self.performance.lock().unwrap().clear();
        self.changes.lock().unwrap().clear();
        self.runs.lock().unwrap().clear();
        Ok(())
    }
}

pub fn stores(
    rows: Vec<StockObservation>,
) -> (Arc<MockObservationRepository>, Arc<MockIndexRepository>) {
    (
        Arc::new(MockObservationRepository::new(rows)),
        Arc::new(MockIndexRepository::default()),
    )
}

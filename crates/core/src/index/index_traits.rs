//! Index repository and service contracts.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{
    CompositionChange, CompositionChanges, CompositionView, ConstructionRequest, ConstructionRun,
    ConstructionSummary, DayRecords, PerformanceRecord, PerformanceSeries, Portfolio,
};
use crate::errors::Result;

/// Persistence of index snapshots, performance, changes and run progress.
///
/// Reads are synchronous; writes are async so implementations can funnel
/// them through a single writer.
#[async_trait]
pub trait IndexRepositoryTrait: Send + Sync {
    fn get_portfolio(&self, date: NaiveDate, top_n: u32) -> Result<Option<Portfolio>>;

    /// The most recent snapshot for `top_n` dated on or before `on_or_before`.
    fn get_latest_portfolio(&self, top_n: u32, on_or_before: NaiveDate)
        -> Result<Option<Portfolio>>;

    /// Performance records in `[start, end]`, ascending by date.
    fn get_performance(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        top_n: u32,
    ) -> Result<Vec<PerformanceRecord>>;

    /// Composition changes in `[start, end]`, ascending by date.
    fn get_composition_changes(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        top_n: u32,
    ) -> Result<Vec<CompositionChange>>;

    fn get_run(&self, top_n: u32) -> Result<Option<ConstructionRun>>;

    /// Replaces the snapshot for (date, top_n), holdings included.
    async fn upsert_portfolio(&self, portfolio: &Portfolio) -> Result<()>;

    async fn upsert_performance_record(&self, record: &PerformanceRecord) -> Result<()>;

    async fn upsert_composition_change(&self, change: &CompositionChange) -> Result<()>;

    /// Starts a fresh run in one transaction: every record of `run.top_n` is
    /// removed, then the INIT snapshot and the run record are written.
    async fn begin_run(&self, run: &ConstructionRun, portfolio: &Portfolio) -> Result<()>;

    async fn save_run(&self, run: &ConstructionRun) -> Result<()>;

    /// Writes everything a trading day produced in one transaction. Changes
    /// previously recorded for the same (date, top_n) are replaced.
    async fn commit_day(&self, day: &DayRecords) -> Result<()>;

    /// Removes every index record. Observations are untouched.
    async fn delete_all(&self) -> Result<()>;
}

/// Entry point used by callers of the index engine.
#[async_trait]
pub trait IndexServiceTrait: Send + Sync {
    async fn run_construction(&self, request: ConstructionRequest) -> Result<ConstructionSummary>;

    /// Continues the run of `top_n` after its last processed day.
    async fn resume_construction(
        &self,
        top_n: u32,
        end_date: NaiveDate,
    ) -> Result<ConstructionSummary>;

    /// Signals the active run of `top_n` to stop. Returns false if none is active.
    fn cancel_construction(&self, top_n: u32) -> bool;

    /// `end` defaults to today.
    fn get_performance(
        &self,
        start: NaiveDate,
        end: Option<NaiveDate>,
        top_n: u32,
    ) -> Result<PerformanceSeries>;

    fn get_composition(&self, date: NaiveDate, top_n: u32) -> Result<CompositionView>;

    /// `end` defaults to today.
    fn get_composition_changes(
        &self,
        start: NaiveDate,
        end: Option<NaiveDate>,
        top_n: u32,
    ) -> Result<CompositionChanges>;

    async fn reset_index(&self) -> Result<()>;

    fn clear_cache(&self);
}

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;

use super::model::{
    CompositionChangeDB, IndexHoldingDB, IndexPerformanceDB, IndexPortfolioDB, IndexRunDB,
};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{
    composition_changes, index_holdings, index_performance, index_portfolios, index_runs,
};
use crate::utils::{chunk_for_sqlite, top_n_to_db};
use eqindex_core::errors::Result;
use eqindex_core::index::{
    CompositionChange, ConstructionRun, DayRecords, IndexRepositoryTrait, PerformanceRecord,
    Portfolio,
};

pub struct IndexRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl IndexRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn load_holdings(
    conn: &mut SqliteConnection,
    row: IndexPortfolioDB,
) -> Result<Portfolio> {
    let holdings = index_holdings::table
        .filter(index_holdings::portfolio_date.eq(row.portfolio_date))
        .filter(index_holdings::top_n.eq(row.top_n))
        .order(index_holdings::position.asc())
        .select(IndexHoldingDB::as_select())
        .load::<IndexHoldingDB>(conn)
        .map_err(StorageError::from)?;
    row.into_domain(holdings)
}

/// Replaces the snapshot row and all of its holdings.
fn write_portfolio(
    conn: &mut SqliteConnection,
    row: &IndexPortfolioDB,
    holdings: &[IndexHoldingDB],
) -> Result<()> {
    diesel::replace_into(index_portfolios::table)
        .values(row)
        .execute(conn)
        .map_err(StorageError::from)?;
    diesel::delete(
        index_holdings::table
            .filter(index_holdings::portfolio_date.eq(row.portfolio_date))
            .filter(index_holdings::top_n.eq(row.top_n)),
    )
    .execute(conn)
    .map_err(StorageError::from)?;
    for chunk in chunk_for_sqlite(holdings) {
        diesel::insert_into(index_holdings::table)
            .values(chunk)
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    Ok(())
}

/// Removes every record of one index size, its run record included.
fn delete_top_n(conn: &mut SqliteConnection, top_n: i32) -> Result<()> {
    diesel::delete(composition_changes::table.filter(composition_changes::top_n.eq(top_n)))
        .execute(conn)
        .map_err(StorageError::from)?;
    diesel::delete(index_performance::table.filter(index_performance::top_n.eq(top_n)))
        .execute(conn)
        .map_err(StorageError::from)?;
    diesel::delete(index_holdings::table.filter(index_holdings::top_n.eq(top_n)))
        .execute(conn)
        .map_err(StorageError::from)?;
    diesel::delete(index_portfolios::table.filter(index_portfolios::top_n.eq(top_n)))
        .execute(conn)
        .map_err(StorageError::from)?;
    diesel::delete(index_runs::table.filter(index_runs::top_n.eq(top_n)))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

fn write_run(conn: &mut SqliteConnection, row: &IndexRunDB) -> Result<()> {
    diesel::replace_into(index_runs::table)
        .values(row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

fn change_rows(changes: &[CompositionChange]) -> Result<Vec<CompositionChangeDB>> {
    changes
        .iter()
        .enumerate()
        .map(|(position, change)| CompositionChangeDB::from_domain(change, position))
        .collect()
}

#[async_trait]
impl IndexRepositoryTrait for IndexRepository {
    fn get_portfolio(&self, date: NaiveDate, top_n: u32) -> Result<Option<Portfolio>> {
        let mut conn = get_connection(&self.pool)?;
        let row = index_portfolios::table
            .find((date, top_n_to_db(top_n)?))
            .select(IndexPortfolioDB::as_select())
            .first::<IndexPortfolioDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(|row| load_holdings(&mut conn, row)).transpose()
    }

    fn get_latest_portfolio(
        &self,
        top_n: u32,
        on_or_before: NaiveDate,
    ) -> Result<Option<Portfolio>> {
        let mut conn = get_connection(&self.pool)?;
        let row = index_portfolios::table
            .filter(index_portfolios::top_n.eq(top_n_to_db(top_n)?))
            .filter(index_portfolios::portfolio_date.le(on_or_before))
            .order(index_portfolios::portfolio_date.desc())
            .select(IndexPortfolioDB::as_select())
            .first::<IndexPortfolioDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(|row| load_holdings(&mut conn, row)).transpose()
    }

    fn get_performance(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        top_n: u32,
    ) -> Result<Vec<PerformanceRecord>> {
        let mut conn = get_connection(&self.pool)?;
        index_performance::table
            .filter(index_performance::top_n.eq(top_n_to_db(top_n)?))
            .filter(index_performance::performance_date.ge(start))
            .filter(index_performance::performance_date.le(end))
            .order(index_performance::performance_date.asc())
            .select(IndexPerformanceDB::as_select())
            .load::<IndexPerformanceDB>(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(PerformanceRecord::try_from)
            .collect()
    }

    fn get_composition_changes(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        top_n: u32,
    ) -> Result<Vec<CompositionChange>> {
        let mut conn = get_connection(&self.pool)?;
        composition_changes::table
            .filter(composition_changes::top_n.eq(top_n_to_db(top_n)?))
            .filter(composition_changes::change_date.ge(start))
            .filter(composition_changes::change_date.le(end))
            .order((
                composition_changes::change_date.asc(),
                composition_changes::position.asc(),
            ))
            .select(CompositionChangeDB::as_select())
            .load::<CompositionChangeDB>(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(CompositionChange::try_from)
            .collect()
    }

    fn get_run(&self, top_n: u32) -> Result<Option<ConstructionRun>> {
        let mut conn = get_connection(&self.pool)?;
        index_runs::table
            .find(top_n_to_db(top_n)?)
            .select(IndexRunDB::as_select())
            .first::<IndexRunDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(ConstructionRun::try_from)
            .transpose()
    }

    async fn upsert_portfolio(&self, portfolio: &Portfolio) -> Result<()> {
        let (row, holdings) = IndexPortfolioDB::from_domain(portfolio)?;
        self.writer
            .exec(move |conn| write_portfolio(conn, &row, &holdings))
            .await
    }

    async fn upsert_performance_record(&self, record: &PerformanceRecord) -> Result<()> {
        let row = IndexPerformanceDB::try_from(record)?;
        self.writer
            .exec(move |conn| {
                diesel::replace_into(index_performance::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn upsert_composition_change(&self, change: &CompositionChange) -> Result<()> {
        let date = change.date;
        let top_n = top_n_to_db(change.top_n)?;
        let mut row = CompositionChangeDB::from_domain(change, 0)?;
        self.writer
            .exec(move |conn| {
                // Append after the day's existing rows unless this row replaces one.
                let existing: Option<i32> = composition_changes::table
                    .find((
                        date,
                        top_n,
                        row.symbol.clone(),
                        row.exchange.clone(),
                        row.change_type.clone(),
                    ))
                    .select(composition_changes::position)
                    .first(conn)
                    .optional()
                    .map_err(StorageError::from)?;
                row.position = match existing {
                    Some(position) => position,
                    None => composition_changes::table
                        .filter(composition_changes::change_date.eq(date))
                        .filter(composition_changes::top_n.eq(top_n))
                        .count()
                        .get_result::<i64>(conn)
                        .map_err(StorageError::from)? as i32,
                };
                diesel::replace_into(composition_changes::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn begin_run(&self, run: &ConstructionRun, portfolio: &Portfolio) -> Result<()> {
        let run_row = IndexRunDB::try_from(run)?;
        let (portfolio_row, holdings) = IndexPortfolioDB::from_domain(portfolio)?;
        self.writer
            .exec(move |conn| {
                let top_n = run_row.top_n;
                delete_top_n(conn, top_n)?;
                write_portfolio(conn, &portfolio_row, &holdings)?;
                write_run(conn, &run_row)?;
                debug!("Started run for top {} from {}", top_n, portfolio_row.portfolio_date);
                Ok(())
            })
            .await
    }

    async fn save_run(&self, run: &ConstructionRun) -> Result<()> {
        let row = IndexRunDB::try_from(run)?;
        self.writer.exec(move |conn| write_run(conn, &row)).await
    }

    async fn commit_day(&self, day: &DayRecords) -> Result<()> {
        let performance_row = IndexPerformanceDB::try_from(&day.performance)?;
        let (portfolio_row, holdings) = IndexPortfolioDB::from_domain(&day.portfolio)?;
        let changes = change_rows(&day.changes)?;
        let run_row = IndexRunDB::try_from(&day.run)?;
        let date = day.performance.date;
        let top_n = performance_row.top_n;

        self.writer
            .exec(move |conn| {
                diesel::replace_into(index_performance::table)
                    .values(&performance_row)
                    .execute(conn)
                    .map_err(StorageError::from)?;

                diesel::delete(
                    composition_changes::table
                        .filter(composition_changes::change_date.eq(date))
                        .filter(composition_changes::top_n.eq(top_n)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                for chunk in chunk_for_sqlite(&changes) {
                    diesel::insert_into(composition_changes::table)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }

                write_portfolio(conn, &portfolio_row, &holdings)?;
                write_run(conn, &run_row)?;
                debug!(
                    "Committed {} for top {}: {} holdings, {} changes",
                    date,
                    top_n,
                    holdings.len(),
                    changes.len()
                );
                Ok(())
            })
            .await
    }

    async fn delete_all(&self) -> Result<()> {
        self.writer
            .exec(|conn| {
                diesel::delete(composition_changes::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(index_performance::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(index_holdings::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(index_portfolios::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(index_runs::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

//! CSV loading of daily observations (`symbol,exchange,date,close,market_cap`).

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use eqindex_core::constants::DATE_FORMAT;
use eqindex_core::StockObservation;
use eqindex_storage_sqlite::ObservationRepository;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct CsvObservationRow {
    symbol: String,
    exchange: String,
    date: String,
    close: Option<String>,
    market_cap: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub rows_read: usize,
    pub rows_rejected: usize,
    pub rows_written: usize,
}

pub async fn import_observations(
    repository: &ObservationRepository,
    path: &Path,
) -> Result<ImportReport> {
    let file =
        File::open(path).with_context(|| format!("open csv path failed: {}", path.display()))?;
    let (observations, mut report) = parse_observations(file);
    report.rows_written = repository.upsert_observations(&observations).await?;
    tracing::info!(
        "Imported {} observations from {} ({} rejected)",
        report.rows_written,
        path.display(),
        report.rows_rejected
    );
    Ok(report)
}

/// Reads every row it can. Rows that do not parse are counted and skipped.
fn parse_observations<R: Read>(reader: R) -> (Vec<StockObservation>, ImportReport) {
    let mut report = ImportReport::default();
    let mut observations = Vec::new();
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    for (line, record) in rdr.deserialize::<CsvObservationRow>().enumerate() {
        report.rows_read += 1;
        let parsed = record
            .map_err(anyhow::Error::from)
            .and_then(into_observation);
        match parsed {
            Ok(observation) => observations.push(observation),
            Err(e) => {
                // +2: header line and 1-based numbering
                tracing::warn!("Skipping csv row {}: {:#}", line + 2, e);
                report.rows_rejected += 1;
            }
        }
    }

    (observations, report)
}

fn into_observation(row: CsvObservationRow) -> Result<StockObservation> {
    if row.symbol.is_empty() || row.exchange.is_empty() {
        anyhow::bail!("symbol and exchange are required");
    }
    let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT)
        .with_context(|| format!("bad date '{}'", row.date))?;

    Ok(StockObservation {
        symbol: row.symbol,
        exchange: row.exchange,
        date,
        close_price: parse_decimal(row.close.as_deref())?,
        market_cap: parse_decimal(row.market_cap.as_deref())?,
    })
}

fn parse_decimal(value: Option<&str>) -> Result<Option<Decimal>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map(Some)
            .with_context(|| format!("bad number '{}'", text)),
    }
}

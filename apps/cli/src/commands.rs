use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use eqindex_core::utils::time_utils::today;
use eqindex_core::ConstructionRequest;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::import::import_observations;
use crate::main_lib::AppState;

#[derive(Debug, Parser)]
#[command(
    name = "eqindex",
    about = "Equal-notional Top-N market-cap index construction"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Construct the index day by day over a date range.
    Build {
        /// First date of the range (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,

        /// Last date of the range (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Index size. Defaults to EQX_DEFAULT_TOP_N.
        #[arg(long)]
        top_n: Option<u32>,

        /// Starting NAV. Defaults to EQX_DEFAULT_INITIAL_NAV.
        #[arg(long)]
        initial_nav: Option<Decimal>,
    },
    /// Continue an interrupted or finished run after its last processed day.
    Resume {
        #[arg(long)]
        top_n: Option<u32>,

        /// Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Daily NAV and returns with a summary.
    Performance {
        #[arg(long)]
        start: NaiveDate,

        /// Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long)]
        top_n: Option<u32>,
    },
    /// Holdings of the index on one date.
    Composition {
        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        top_n: Option<u32>,
    },
    /// Entries and exits grouped by date.
    Changes {
        #[arg(long)]
        start: NaiveDate,

        /// Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long)]
        top_n: Option<u32>,
    },
    /// Load daily observations from a CSV file.
    Import {
        /// CSV with header `symbol,exchange,date,close,market_cap`.
        path: PathBuf,
    },
    /// Delete every index record. Observations are kept.
    Reset {
        /// Actually delete (without this flag nothing is removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
    /// Drop cached read results.
    ClearCache,
}

pub async fn run(command: Command, state: &AppState) -> Result<()> {
    let service = state.index_service.as_ref();
    let top_n_or_default = |top_n: Option<u32>| top_n.unwrap_or(state.config.default_top_n);

    match command {
        Command::Build {
            start,
            end,
            top_n,
            initial_nav,
        } => {
            let request = ConstructionRequest {
                start_date: start,
                end_date: end.unwrap_or_else(today),
                top_n: top_n_or_default(top_n),
                initial_nav: initial_nav.unwrap_or(state.config.default_initial_nav),
            };
            let top_n = request.top_n;
            let summary = until_interrupted(state, top_n, service.run_construction(request)).await?;
            print_json(&summary)
        }
        Command::Resume { top_n, end } => {
            let top_n = top_n_or_default(top_n);
            let end = end.unwrap_or_else(today);
            let summary =
                until_interrupted(state, top_n, service.resume_construction(top_n, end)).await?;
            print_json(&summary)
        }
        Command::Performance { start, end, top_n } => {
            print_json(&service.get_performance(start, end, top_n_or_default(top_n))?)
        }
        Command::Composition { date, top_n } => {
            print_json(&service.get_composition(date, top_n_or_default(top_n))?)
        }
        Command::Changes { start, end, top_n } => {
            print_json(&service.get_composition_changes(start, end, top_n_or_default(top_n))?)
        }
        Command::Import { path } => {
            let report = import_observations(&state.observation_repository, &path).await?;
            print_json(&report)
        }
        Command::Reset { confirm } => {
            if !confirm {
                println!("Would delete all index records. Re-run with --confirm to proceed.");
                return Ok(());
            }
            service.reset_index().await?;
            tracing::info!("Index records deleted");
            Ok(())
        }
        Command::ClearCache => {
            service.clear_cache();
            tracing::info!("Cache cleared");
            Ok(())
        }
    }
}

/// Drives a construction, cancelling it on Ctrl-C. The run stops before its
/// next day and the error reports where it can be resumed from.
async fn until_interrupted<F, T>(state: &AppState, top_n: u32, construction: F) -> Result<T>
where
    F: std::future::Future<Output = eqindex_core::Result<T>>,
{
    tokio::pin!(construction);
    let outcome = tokio::select! {
        outcome = &mut construction => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupt received, cancelling construction of top {}", top_n);
            state.index_service.cancel_construction(top_n);
            construction.await
        }
    };
    Ok(outcome?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

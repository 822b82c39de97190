//! Day-by-day construction of an equal-notional Top-N index.

use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;

use super::rebalance::{equal_weight, rebalance};
use super::selector::{require_top_n, TopNSelector};
use super::valuation::{percent_change, value_holdings};
use super::{
    CancellationFlag, ChangeType, CompositionChange, ConstructionRequest, ConstructionRun,
    ConstructionState, ConstructionSummary, DayRecords, EngineConfig, IndexError,
    IndexRepositoryTrait, PerformanceRecord, Portfolio,
};
use crate::constants::{DISPLAY_DECIMAL_PRECISION, PROGRESS_LOG_INTERVAL};
use crate::errors::{Error, Result};
use crate::market_data::ObservationRepositoryTrait;
use crate::utils::time_utils::{days_before, get_days_between};

enum DayOutcome {
    /// Nothing held was priced and nothing qualified. No records are written.
    Closed,
    Traded {
        performance: PerformanceRecord,
        portfolio: Portfolio,
        changes: Vec<CompositionChange>,
    },
}

/// Runs INIT then ITERATE for a single index size.
///
/// An engine drives one run. Runs for different `top_n` use separate
/// engines and may proceed concurrently against the same stores.
pub struct IndexConstructionEngine {
    observations: Arc<dyn ObservationRepositoryTrait>,
    repository: Arc<dyn IndexRepositoryTrait>,
    selector: TopNSelector,
    config: EngineConfig,
    cancellation: CancellationFlag,
    state: ConstructionState,
}

impl IndexConstructionEngine {
    pub fn new(
        observations: Arc<dyn ObservationRepositoryTrait>,
        repository: Arc<dyn IndexRepositoryTrait>,
        config: EngineConfig,
    ) -> Self {
        Self {
            selector: TopNSelector::new(observations.clone()),
            observations,
            repository,
            config,
            cancellation: CancellationFlag::new(),
            state: ConstructionState::Uninitialized,
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn state(&self) -> ConstructionState {
        self.state
    }

    fn transition(&mut self, next: ConstructionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(IndexError::InvalidTransition {
                from: self.state,
                to: next,
            }
            .into());
        }
        debug!("Construction state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Builds the index over `[start_date, end_date]` from scratch.
    pub async fn run(&mut self, request: &ConstructionRequest) -> Result<ConstructionSummary> {
        request.validate()?;
        self.transition(ConstructionState::Initializing)?;
        info!(
            "Constructing top {} index from {} to {} with initial nav {}",
            request.top_n, request.start_date, request.end_date, request.initial_nav
        );

        let base = match self.initialize(request).await {
            Ok(portfolio) => portfolio,
            Err(e) => {
                self.state = ConstructionState::Failed;
                error!("Initialization of top {} failed: {}", request.top_n, e);
                return Err(e);
            }
        };

        if self.cancellation.is_cancelled() {
            self.transition(ConstructionState::Cancelled)?;
            warn!("Construction of top {} cancelled during initialization", request.top_n);
            return Err(IndexError::Cancelled {
                top_n: request.top_n,
                last_processed: None,
            }
            .into());
        }

        let run = ConstructionRun {
            top_n: request.top_n,
            start_date: request.start_date,
            end_date: request.end_date,
            base_date: base.date,
            base_nav: request.initial_nav,
            last_processed_date: None,
            state: ConstructionState::Iterating,
        };
        if let Err(e) = self.repository.begin_run(&run, &base).await {
            self.state = ConstructionState::Failed;
            error!("Failed to persist initial portfolio for top {}: {}", run.top_n, e);
            return Err(e);
        }
        self.transition(ConstructionState::Iterating)?;

        let start = request.start_date;
        self.iterate(run, base, start).await
    }

    /// Continues a persisted run from the day after its last processed day.
    pub async fn resume(&mut self, top_n: u32, end_date: NaiveDate) -> Result<ConstructionSummary> {
        let mut run = self
            .repository
            .get_run(top_n)?
            .ok_or(IndexError::RunNotFound(top_n))?;
        if !run.state.is_resumable() {
            return Err(IndexError::InvalidRequest(format!(
                "run for top {} is {} and cannot be resumed",
                top_n, run.state
            ))
            .into());
        }

        let from = match run.last_processed_date {
            Some(last) => last.succ_opt().ok_or_else(|| {
                IndexError::InvalidRequest(format!("no day follows {}", last))
            })?,
            None => run.start_date,
        };
        if end_date < from {
            return Err(IndexError::InvalidRequest(format!(
                "end_date {} is before the next unprocessed day {}",
                end_date, from
            ))
            .into());
        }

        let anchor = run.last_processed_date.unwrap_or(run.base_date);
        let portfolio = self
            .repository
            .get_latest_portfolio(top_n, anchor)?
            .ok_or_else(|| {
                IndexError::NotFound(format!(
                    "no portfolio for top {} on or before {}",
                    top_n, anchor
                ))
            })?;

        info!(
            "Resuming top {} from {} through {} (portfolio of {}, nav {})",
            top_n, from, end_date, portfolio.date, portfolio.nav
        );
        run.end_date = end_date;
        self.transition(ConstructionState::Iterating)?;
        self.iterate(run, portfolio, from).await
    }

    async fn initialize(&self, request: &ConstructionRequest) -> Result<Portfolio> {
        let n = request.top_n as usize;
        let lookback_days = self.config.init_lookback_days;

        for date in days_before(request.start_date, lookback_days) {
            match self.selector.select(date, n).await {
                Ok(candidates) => {
                    info!(
                        "Initializing top {} on {} with nav {}",
                        request.top_n, date, request.initial_nav
                    );
                    let holdings = equal_weight(&candidates, request.initial_nav)?;
                    return Ok(Portfolio {
                        date,
                        top_n: request.top_n,
                        holdings,
                        nav: request.initial_nav,
                    });
                }
                Err(Error::Index(IndexError::NoTradingData { found, required, .. })) => {
                    debug!(
                        "No initialization data on {}: {} of {} qualifying",
                        date, found, required
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(IndexError::NoInitialTradingDay {
            start_date: request.start_date,
            lookback_days,
            required: n,
        }
        .into())
    }

    async fn iterate(
        &mut self,
        mut run: ConstructionRun,
        mut portfolio: Portfolio,
        from: NaiveDate,
    ) -> Result<ConstructionSummary> {
        let days = get_days_between(from, run.end_date);
        let total_days = days.len();
        let mut previous_nav = portfolio.nav;
        let mut days_processed = 0usize;
        run.state = ConstructionState::Iterating;

        for (index, date) in days.into_iter().enumerate() {
            if self.cancellation.is_cancelled() {
                return Err(self.cancel(&mut run).await);
            }

            let outcome = match self.process_day(&run, &portfolio, previous_nav, date).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.halt(&mut run, date, e).await),
            };

            let mut progress = run.clone();
            progress.last_processed_date = Some(date);

            match outcome {
                DayOutcome::Closed => {
                    info!("No trading on {} for top {}, skipping", date, run.top_n);
                    if let Err(e) = self.repository.save_run(&progress).await {
                        return Err(self.halt(&mut run, date, e).await);
                    }
                    run = progress;
                }
                DayOutcome::Traded {
                    performance,
                    portfolio: next,
                    changes,
                } => {
                    let day = DayRecords {
                        performance,
                        portfolio: next,
                        changes,
                        run: progress,
                    };
                    if let Err(e) = self.repository.commit_day(&day).await {
                        return Err(self.halt(&mut run, date, e).await);
                    }
                    previous_nav = day.performance.nav;
                    portfolio = day.portfolio;
                    run = day.run;
                    days_processed += 1;

                    if days_processed % PROGRESS_LOG_INTERVAL == 0 {
                        info!(
                            "Top {}: processed {} of {} days through {}, nav {}",
                            run.top_n,
                            index + 1,
                            total_days,
                            date,
                            previous_nav
                        );
                    }
                }
            }
        }

        self.transition(ConstructionState::Complete)?;
        run.state = ConstructionState::Complete;
        self.repository.save_run(&run).await?;

        let total_return_pct = percent_change(run.base_nav, previous_nav);
        info!(
            "Completed top {} through {}: final nav {}, total return {}%, {} trading days",
            run.top_n,
            run.end_date,
            previous_nav,
            total_return_pct.round_dp(DISPLAY_DECIMAL_PRECISION),
            days_processed
        );

        Ok(ConstructionSummary {
            top_n: run.top_n,
            start_date: run.start_date,
            end_date: run.end_date,
            base_date: run.base_date,
            initial_nav: run.base_nav,
            final_nav: previous_nav,
            total_return_pct,
            days_processed,
            state: run.state,
        })
    }

    async fn process_day(
        &self,
        run: &ConstructionRun,
        portfolio: &Portfolio,
        previous_nav: Decimal,
        date: NaiveDate,
    ) -> Result<DayOutcome> {
        let n = run.top_n as usize;
        let keys = portfolio.keys();
        let (priced, ranked) = futures::try_join!(
            self.observations.get_observations(&keys, date),
            self.selector.rank(date, n),
        )?;

        let priced_holdings = priced
            .iter()
            .filter(|obs| obs.date == date && obs.qualify().is_some())
            .count();
        if priced_holdings == 0 && ranked.is_empty() {
            return Ok(DayOutcome::Closed);
        }

        let valuation = value_holdings(date, &portfolio.holdings, &priced)?;
        let nav = valuation.nav;
        let performance = PerformanceRecord {
            date,
            top_n: run.top_n,
            nav,
            daily_return_pct: percent_change(previous_nav, nav),
            cumulative_return_pct: percent_change(run.base_nav, nav),
        };
        debug!(
            "{} top {}: nav {}, daily {}%, cumulative {}%",
            date,
            run.top_n,
            nav,
            performance.daily_return_pct.round_dp(DISPLAY_DECIMAL_PRECISION),
            performance.cumulative_return_pct.round_dp(DISPLAY_DECIMAL_PRECISION)
        );

        // Every holding qualified during valuation, so at least N candidates rank.
        let candidates = require_top_n(date, n, ranked)?;
        let outcome = rebalance(date, run.top_n, nav, valuation.holdings, &candidates)?;
        if outcome.rebalanced {
            let entered = outcome
                .changes
                .iter()
                .filter(|c| c.change_type == ChangeType::Enter)
                .count();
            info!(
                "Reconstituted top {} on {}: {} entered, {} exited",
                run.top_n,
                date,
                entered,
                outcome.changes.len() - entered
            );
        }

        Ok(DayOutcome::Traded {
            performance,
            portfolio: Portfolio {
                date,
                top_n: run.top_n,
                holdings: outcome.holdings,
                nav,
            },
            changes: outcome.changes,
        })
    }

    async fn halt(&mut self, run: &mut ConstructionRun, date: NaiveDate, err: Error) -> Error {
        self.state = ConstructionState::Failed;
        run.state = ConstructionState::Failed;
        let kind = err.index_error().map(IndexError::kind).unwrap_or("Storage");
        error!(
            "Construction of top {} halted on {} ({}): {}",
            run.top_n, date, kind, err
        );
        if let Err(save_err) = self.repository.save_run(run).await {
            error!("Failed to record halted run for top {}: {}", run.top_n, save_err);
        }
        IndexError::Halted {
            date,
            source: Box::new(err),
        }
        .into()
    }

    async fn cancel(&mut self, run: &mut ConstructionRun) -> Error {
        self.state = ConstructionState::Cancelled;
        run.state = ConstructionState::Cancelled;
        warn!(
            "Construction of top {} cancelled after {:?}",
            run.top_n, run.last_processed_date
        );
        if let Err(save_err) = self.repository.save_run(run).await {
            error!("Failed to record cancelled run for top {}: {}", run.top_n, save_err);
        }
        IndexError::Cancelled {
            top_n: run.top_n,
            last_processed: run.last_processed_date,
        }
        .into()
    }
}

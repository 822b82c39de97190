use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::test_support::{d, obs, stores, MockIndexRepository, MockObservationRepository};
use super::*;
use crate::errors::Error;
use crate::market_data::StockObservation;

fn scenario() -> Vec<StockObservation> {
    vec![
        obs("A", "2024-01-01", dec!(100), dec!(500)),
        obs("B", "2024-01-01", dec!(50), dec!(400)),
        obs("A", "2024-01-02", dec!(110), dec!(550)),
        obs("B", "2024-01-02", dec!(55), dec!(440)),
        obs("A", "2024-01-03", dec!(110), dec!(550)),
        obs("B", "2024-01-03", dec!(55), dec!(300)),
        obs("C", "2024-01-03", dec!(20), dec!(600)),
        obs("A", "2024-01-04", dec!(121), dec!(605)),
        obs("C", "2024-01-04", dec!(22), dec!(660)),
    ]
}

fn request(start: &str, end: &str, top_n: u32) -> ConstructionRequest {
    ConstructionRequest {
        start_date: d(start),
        end_date: d(end),
        top_n,
        initial_nav: dec!(1000),
    }
}

fn engine(
    observations: &Arc<MockObservationRepository>,
    repository: &Arc<MockIndexRepository>,
) -> IndexConstructionEngine {
    IndexConstructionEngine::new(
        observations.clone(),
        repository.clone(),
        EngineConfig::default(),
    )
}

fn shares_of(portfolio: &Portfolio, symbol: &str) -> Decimal {
    portfolio
        .holdings
        .iter()
        .find(|h| h.symbol == symbol)
        .map(|h| h.shares)
        .unwrap()
}

#[tokio::test]
async fn test_first_day_return_from_equal_notional_init() {
    let (observations, repository) = stores(scenario());
    let mut engine = engine(&observations, &repository);

    let summary = engine.run(&request("2024-01-02", "2024-01-02", 2)).await.unwrap();

    assert_eq!(summary.base_date, d("2024-01-01"));
    assert_eq!(summary.final_nav, dec!(1100));
    assert_eq!(summary.total_return_pct, dec!(10));
    assert_eq!(summary.days_processed, 1);
    assert_eq!(summary.state, ConstructionState::Complete);
    assert_eq!(engine.state(), ConstructionState::Complete);

    let base = repository.get_portfolio(d("2024-01-01"), 2).unwrap().unwrap();
    assert_eq!(base.nav, dec!(1000));
    assert_eq!(shares_of(&base, "A"), dec!(5));
    assert_eq!(shares_of(&base, "B"), dec!(10));

    let performance = repository.performance_rows();
    assert_eq!(performance.len(), 1);
    assert_eq!(performance[0].nav, dec!(1100));
    assert_eq!(performance[0].daily_return_pct, dec!(10));
    assert_eq!(performance[0].cumulative_return_pct, dec!(10));
    assert!(repository.change_rows().is_empty());

    // Unchanged membership carries the share counts, marked to the new closes.
    let day = repository.get_portfolio(d("2024-01-02"), 2).unwrap().unwrap();
    assert_eq!(shares_of(&day, "A"), dec!(5));
    assert_eq!(day.holdings[0].close_price, dec!(110));
}

#[tokio::test]
async fn test_membership_change_rebalances_at_day_nav() {
    let (observations, repository) = stores(scenario());
    let mut engine = engine(&observations, &repository);

    let summary = engine.run(&request("2024-01-02", "2024-01-04", 2)).await.unwrap();

    let changes = repository.get_composition_changes(d("2024-01-03"), d("2024-01-03"), 2).unwrap();
    assert_eq!(changes.len(), 2);
    let enter = changes.iter().find(|c| c.change_type == ChangeType::Enter).unwrap();
    let exit = changes.iter().find(|c| c.change_type == ChangeType::Exit).unwrap();
    assert_eq!(enter.symbol, "C");
    assert_eq!(enter.market_cap, dec!(600));
    assert_eq!(exit.symbol, "B");
    assert_eq!(exit.market_cap, dec!(300));

    let rebalanced = repository.get_portfolio(d("2024-01-03"), 2).unwrap().unwrap();
    assert_eq!(rebalanced.nav, dec!(1100));
    assert_eq!(rebalanced.holdings[0].symbol, "C");
    assert_eq!(shares_of(&rebalanced, "C"), dec!(27.5));
    assert_eq!(shares_of(&rebalanced, "A"), dec!(5));

    let last = repository.get_performance(d("2024-01-04"), d("2024-01-04"), 2).unwrap();
    assert_eq!(last[0].nav, dec!(1210));
    assert_eq!(last[0].daily_return_pct, dec!(10));
    assert_eq!(last[0].cumulative_return_pct, dec!(21));

    assert_eq!(summary.final_nav, dec!(1210));
    assert_eq!(summary.total_return_pct, dec!(21));
    assert_eq!(summary.days_processed, 3);
}

#[tokio::test]
async fn test_cumulative_return_is_measured_from_initial_nav() {
    let (observations, repository) = stores(scenario());
    engine(&observations, &repository)
        .run(&request("2024-01-02", "2024-01-04", 2))
        .await
        .unwrap();

    for record in repository.performance_rows() {
        assert_eq!(
            record.cumulative_return_pct,
            percent_change(dec!(1000), record.nav)
        );
    }
}

#[tokio::test]
async fn test_no_initial_trading_day_persists_nothing() {
    let (observations, repository) = stores(vec![
        obs("A", "2023-12-22", dec!(100), dec!(500)),
        obs("B", "2023-12-22", dec!(50), dec!(400)),
        obs("A", "2024-01-02", dec!(110), dec!(550)),
        obs("B", "2024-01-02", dec!(55), dec!(440)),
    ]);
    let mut engine = engine(&observations, &repository);

    let err = engine.run(&request("2024-01-02", "2024-01-02", 2)).await.unwrap_err();

    match err.index_error() {
        Some(IndexError::NoInitialTradingDay {
            lookback_days,
            required,
            ..
        }) => {
            assert_eq!(*lookback_days, 10);
            assert_eq!(*required, 2);
        }
        other => panic!("expected NoInitialTradingDay, got {:?}", other),
    }
    assert!(repository.is_empty());
    assert_eq!(engine.state(), ConstructionState::Failed);
}

#[tokio::test]
async fn test_init_search_reaches_the_last_lookback_day() {
    let (observations, repository) = stores(vec![
        // A alone on the day before start is not enough for N = 2.
        obs("A", "2024-01-01", dec!(100), dec!(500)),
        obs("A", "2023-12-23", dec!(100), dec!(500)),
        obs("B", "2023-12-23", dec!(50), dec!(400)),
        obs("A", "2024-01-02", dec!(110), dec!(550)),
        obs("B", "2024-01-02", dec!(55), dec!(440)),
    ]);

    let summary = engine(&observations, &repository)
        .run(&request("2024-01-02", "2024-01-02", 2))
        .await
        .unwrap();

    assert_eq!(summary.base_date, d("2023-12-23"));
    assert!(repository.get_portfolio(d("2023-12-23"), 2).unwrap().is_some());
}

#[tokio::test]
async fn test_rerun_over_same_range_is_idempotent() {
    let (observations, repository) = stores(scenario());
    engine(&observations, &repository)
        .run(&request("2024-01-02", "2024-01-04", 2))
        .await
        .unwrap();
    let performance = repository.performance_rows();
    let changes = repository.change_rows();
    let portfolios = repository.portfolio_rows();

    engine(&observations, &repository)
        .run(&request("2024-01-02", "2024-01-04", 2))
        .await
        .unwrap();

    assert_eq!(repository.performance_rows(), performance);
    assert_eq!(repository.change_rows(), changes);
    assert_eq!(repository.portfolio_rows(), portfolios);
}

#[tokio::test]
async fn test_rerun_with_later_start_replaces_earlier_records() {
    let (observations, repository) = stores(scenario());
    engine(&observations, &repository)
        .run(&request("2024-01-02", "2024-01-04", 2))
        .await
        .unwrap();
    engine(&observations, &repository)
        .run(&request("2024-01-02", "2024-01-04", 1))
        .await
        .unwrap();
    let top_one = repository.get_performance(d("2024-01-01"), d("2024-01-04"), 1).unwrap();

    let summary = engine(&observations, &repository)
        .run(&request("2024-01-03", "2024-01-04", 2))
        .await
        .unwrap();
    assert_eq!(summary.base_date, d("2024-01-02"));

    let performance = repository.get_performance(d("2024-01-01"), d("2024-01-04"), 2).unwrap();
    let dates: Vec<_> = performance.iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![d("2024-01-03"), d("2024-01-04")]);
    assert!(repository.get_portfolio(d("2024-01-01"), 2).unwrap().is_none());

    let base = repository.get_portfolio(d("2024-01-02"), 2).unwrap().unwrap();
    assert_eq!(base.nav, dec!(1000));

    let mut previous_nav = base.nav;
    for record in &performance {
        let snapshot = repository.get_portfolio(record.date, 2).unwrap().unwrap();
        assert_eq!(snapshot.nav, record.nav);
        assert_eq!(record.daily_return_pct, percent_change(previous_nav, record.nav));
        assert_eq!(record.cumulative_return_pct, percent_change(dec!(1000), record.nav));
        previous_nav = record.nav;
    }

    // Other index sizes are left alone.
    assert_eq!(
        repository.get_performance(d("2024-01-01"), d("2024-01-04"), 1).unwrap(),
        top_one
    );
}

#[tokio::test]
async fn test_closed_day_is_skipped() {
    let (observations, repository) = stores(vec![
        obs("A", "2024-01-01", dec!(100), dec!(500)),
        obs("B", "2024-01-01", dec!(50), dec!(400)),
        obs("A", "2024-01-02", dec!(110), dec!(550)),
        obs("B", "2024-01-02", dec!(55), dec!(440)),
        obs("A", "2024-01-04", dec!(121), dec!(605)),
        obs("B", "2024-01-04", dec!(60.5), dec!(450)),
    ]);

    let summary = engine(&observations, &repository)
        .run(&request("2024-01-02", "2024-01-04", 2))
        .await
        .unwrap();

    let dates: Vec<_> = repository.performance_rows().iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![d("2024-01-02"), d("2024-01-04")]);
    let last = repository.get_performance(d("2024-01-04"), d("2024-01-04"), 2).unwrap();
    assert_eq!(last[0].daily_return_pct, dec!(10));
    assert!(repository.get_portfolio(d("2024-01-03"), 2).unwrap().is_none());

    assert_eq!(summary.days_processed, 2);
    let run = repository.get_run(2).unwrap().unwrap();
    assert_eq!(run.last_processed_date, Some(d("2024-01-04")));
}

#[tokio::test]
async fn test_missing_price_halts_and_keeps_earlier_days() {
    let mut rows = scenario();
    rows.retain(|o| !(o.symbol == "B" && o.date == d("2024-01-03")));
    let (observations, repository) = stores(rows);
    let mut engine = engine(&observations, &repository);

    let err = engine.run(&request("2024-01-02", "2024-01-04", 2)).await.unwrap_err();

    match &err {
        Error::Index(IndexError::Halted { date, .. }) => assert_eq!(*date, d("2024-01-03")),
        other => panic!("expected a halt, got {:?}", other),
    }
    match err.index_error() {
        Some(IndexError::MissingPrice { key, .. }) => assert_eq!(key.symbol, "B"),
        other => panic!("expected MissingPrice, got {:?}", other),
    }

    let dates: Vec<_> = repository.performance_rows().iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![d("2024-01-02")]);
    let run = repository.get_run(2).unwrap().unwrap();
    assert_eq!(run.state, ConstructionState::Failed);
    assert_eq!(run.last_processed_date, Some(d("2024-01-02")));
    assert_eq!(engine.state(), ConstructionState::Failed);
}

#[tokio::test]
async fn test_nav_overflow_halts_instead_of_panicking() {
    let (observations, repository) = stores(scenario());
    let mut request = request("2024-01-02", "2024-01-04", 2);
    request.initial_nav = Decimal::MAX;

    let err = engine(&observations, &repository).run(&request).await.unwrap_err();

    match &err {
        Error::Index(IndexError::Halted { date, .. }) => assert_eq!(*date, d("2024-01-02")),
        other => panic!("expected a halt, got {:?}", other),
    }
    assert!(matches!(err.index_error(), Some(IndexError::Calculation(_))));
    assert!(repository.performance_rows().is_empty());
    let run = repository.get_run(2).unwrap().unwrap();
    assert_eq!(run.state, ConstructionState::Failed);
}

#[tokio::test]
async fn test_failed_commit_halts_without_advancing() {
    let (observations, repository) = stores(scenario());
    repository.fail_commit_on(d("2024-01-03"));

    let err = engine(&observations, &repository)
        .run(&request("2024-01-02", "2024-01-04", 2))
        .await
        .unwrap_err();

    match &err {
        Error::Index(IndexError::Halted { date, source }) => {
            assert_eq!(*date, d("2024-01-03"));
            assert!(matches!(**source, Error::Database(_)));
        }
        other => panic!("expected a halt, got {:?}", other),
    }
    let run = repository.get_run(2).unwrap().unwrap();
    assert_eq!(run.last_processed_date, Some(d("2024-01-02")));
    assert!(repository.change_rows().is_empty());
}

#[tokio::test]
async fn test_cancelled_run_resumes_to_the_same_result() {
    let (observations, repository) = stores(scenario());
    let flag = CancellationFlag::new();
    repository.cancel_after_commits(1, flag.clone());

    let err = engine(&observations, &repository)
        .with_cancellation(flag)
        .run(&request("2024-01-02", "2024-01-04", 2))
        .await
        .unwrap_err();
    match err.index_error() {
        Some(IndexError::Cancelled { last_processed, .. }) => {
            assert_eq!(*last_processed, Some(d("2024-01-02")))
        }
        other => panic!("expected Cancelled, got {:?}", other),
    }
    assert_eq!(
        repository.get_run(2).unwrap().unwrap().state,
        ConstructionState::Cancelled
    );

    let summary = engine(&observations, &repository)
        .resume(2, d("2024-01-04"))
        .await
        .unwrap();
    assert_eq!(summary.days_processed, 2);
    assert_eq!(summary.final_nav, dec!(1210));
    assert_eq!(summary.total_return_pct, dec!(21));

    let (_, uninterrupted) = stores(Vec::new());
    engine(&observations, &uninterrupted)
        .run(&request("2024-01-02", "2024-01-04", 2))
        .await
        .unwrap();
    assert_eq!(repository.performance_rows(), uninterrupted.performance_rows());
    assert_eq!(repository.change_rows(), uninterrupted.change_rows());
}

#[tokio::test]
async fn test_resume_extends_a_completed_run() {
    let (observations, repository) = stores(scenario());
    engine(&observations, &repository)
        .run(&request("2024-01-02", "2024-01-03", 2))
        .await
        .unwrap();

    let summary = engine(&observations, &repository)
        .resume(2, d("2024-01-04"))
        .await
        .unwrap();

    assert_eq!(summary.days_processed, 1);
    assert_eq!(summary.final_nav, dec!(1210));
    let run = repository.get_run(2).unwrap().unwrap();
    assert_eq!(run.end_date, d("2024-01-04"));
    assert_eq!(run.base_date, d("2024-01-01"));
}

#[tokio::test]
async fn test_resume_without_run_is_not_found() {
    let (observations, repository) = stores(scenario());
    let err = engine(&observations, &repository)
        .resume(2, d("2024-01-04"))
        .await
        .unwrap_err();
    assert!(matches!(err.index_error(), Some(IndexError::RunNotFound(2))));
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_init() {
    let (observations, repository) = stores(scenario());
    let mut engine = engine(&observations, &repository);

    let err = engine.run(&request("2024-01-02", "2024-01-04", 0)).await.unwrap_err();

    assert!(matches!(err.index_error(), Some(IndexError::InvalidRequest(_))));
    assert_eq!(engine.state(), ConstructionState::Uninitialized);
    assert!(repository.is_empty());
}

#[tokio::test]
async fn test_engine_runs_once() {
    let (observations, repository) = stores(scenario());
    let mut engine = engine(&observations, &repository);
    engine.run(&request("2024-01-02", "2024-01-02", 2)).await.unwrap();

    let err = engine.run(&request("2024-01-02", "2024-01-02", 2)).await.unwrap_err();
    assert!(matches!(
        err.index_error(),
        Some(IndexError::InvalidTransition { .. })
    ));
}

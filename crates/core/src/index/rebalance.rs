//! Reconstitution and equal-notional rebalancing.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{ChangeType, CompositionChange, Holding, IndexError};
use crate::market_data::{InstrumentKey, QualifiedObservation};

/// Membership difference between the held set and the day's top N.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconstitution {
    /// Candidates not currently held, in rank order.
    pub entries: Vec<QualifiedObservation>,
    /// Holdings no longer in the top N, in holding order.
    pub exits: Vec<Holding>,
}

impl Reconstitution {
    pub fn changed(&self) -> bool {
        !self.entries.is_empty() || !self.exits.is_empty()
    }
}

pub fn reconstitute(holdings: &[Holding], candidates: &[QualifiedObservation]) -> Reconstitution {
    let held: HashSet<InstrumentKey> = holdings.iter().map(Holding::key).collect();
    let selected: HashSet<InstrumentKey> = candidates.iter().map(QualifiedObservation::key).collect();

    Reconstitution {
        entries: candidates
            .iter()
            .filter(|c| !held.contains(&c.key()))
            .cloned()
            .collect(),
        exits: holdings
            .iter()
            .filter(|h| !selected.contains(&h.key()))
            .cloned()
            .collect(),
    }
}

/// Equal-notional holdings over `candidates` for a portfolio worth `nav`.
///
/// Each constituent gets `nav / N` of notional at its close, so
/// `shares = nav / N / close` and `reference_weight = 1 / N`.
pub fn equal_weight(
    candidates: &[QualifiedObservation],
    nav: Decimal,
) -> Result<Vec<Holding>, IndexError> {
    if candidates.is_empty() {
        return Err(IndexError::Calculation(
            "cannot weight an empty constituent list".to_string(),
        ));
    }
    let count = Decimal::from(candidates.len());
    let notional = nav
        .checked_div(count)
        .ok_or_else(|| IndexError::Calculation(format!("{} / {} overflowed", nav, count)))?;
    let weight = Decimal::ONE / count;

    candidates
        .iter()
        .map(|candidate| {
            let shares = notional.checked_div(candidate.close_price).ok_or_else(|| {
                IndexError::Calculation(format!(
                    "cannot size {} at close {}",
                    candidate.key(),
                    candidate.close_price
                ))
            })?;
            Ok(Holding {
                symbol: candidate.symbol.clone(),
                exchange: candidate.exchange.clone(),
                shares,
                reference_weight: weight,
                close_price: candidate.close_price,
                market_cap: candidate.market_cap,
            })
        })
        .collect()
}

/// ENTER rows in rank order followed by EXIT rows.
///
/// An exit carries the market cap of the day's mark of the leaving holding.
pub fn composition_changes(
    date: NaiveDate,
    top_n: u32,
    reconstitution: &Reconstitution,
) -> Vec<CompositionChange> {
    let entries = reconstitution.entries.iter().map(|c| CompositionChange {
        date,
        top_n,
        symbol: c.symbol.clone(),
        exchange: c.exchange.clone(),
        change_type: ChangeType::Enter,
        market_cap: c.market_cap,
    });
    let exits = reconstitution.exits.iter().map(|h| CompositionChange {
        date,
        top_n,
        symbol: h.symbol.clone(),
        exchange: h.exchange.clone(),
        change_type: ChangeType::Exit,
        market_cap: h.market_cap,
    });
    entries.chain(exits).collect()
}

/// Result of applying a day's selection to the marked holdings.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOutcome {
    pub holdings: Vec<Holding>,
    pub changes: Vec<CompositionChange>,
    pub rebalanced: bool,
}

/// Rebalances `marked` holdings to `candidates` at `nav` if membership changed.
///
/// With unchanged membership the marked holdings are kept as they are and
/// no changes are emitted.
pub fn rebalance(
    date: NaiveDate,
    top_n: u32,
    nav: Decimal,
    marked: Vec<Holding>,
    candidates: &[QualifiedObservation],
) -> Result<RebalanceOutcome, IndexError> {
    let reconstitution = reconstitute(&marked, candidates);
    if !reconstitution.changed() {
        return Ok(RebalanceOutcome {
            holdings: marked,
            changes: Vec::new(),
            rebalanced: false,
        });
    }

    Ok(RebalanceOutcome {
        holdings: equal_weight(candidates, nav)?,
        changes: composition_changes(date, top_n, &reconstitution),
        rebalanced: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()
    }

    fn candidate(symbol: &str, price: Decimal, cap: Decimal) -> QualifiedObservation {
        QualifiedObservation {
            symbol: symbol.to_string(),
            exchange: "NYSE".to_string(),
            date: date(),
            close_price: price,
            market_cap: cap,
        }
    }

    fn holding(symbol: &str, shares: Decimal, price: Decimal, cap: Decimal) -> Holding {
        Holding {
            symbol: symbol.to_string(),
            exchange: "NYSE".to_string(),
            shares,
            reference_weight: dec!(0.5),
            close_price: price,
            market_cap: cap,
        }
    }

    #[test]
    fn test_equal_weight_splits_notional() {
        let candidates = vec![candidate("AAA", dec!(100), dec!(1000)), candidate("BBB", dec!(50), dec!(900))];
        let holdings = equal_weight(&candidates, dec!(1000)).unwrap();
        assert_eq!(holdings[0].shares, dec!(5));
        assert_eq!(holdings[1].shares, dec!(10));
        assert_eq!(holdings[0].reference_weight, dec!(0.5));
        let total: Decimal = holdings.iter().map(Holding::notional_value).sum();
        assert_eq!(total, dec!(1000));
    }

    #[test]
    fn test_unchanged_membership_keeps_shares() {
        let marked = vec![
            holding("AAA", dec!(5), dec!(110), dec!(1100)),
            holding("BBB", dec!(10), dec!(45), dec!(450)),
        ];
        // Reordered ranking alone is not a membership change.
        let candidates = vec![candidate("AAA", dec!(110), dec!(1100)), candidate("BBB", dec!(45), dec!(450))];
        let outcome = rebalance(date(), 2, dec!(1000), marked.clone(), &candidates).unwrap();
        assert!(!outcome.rebalanced);
        assert!(outcome.changes.is_empty());
        assert_eq!(outcome.holdings, marked);
    }

    #[test]
    fn test_membership_change_emits_entries_then_exits() {
        let marked = vec![
            holding("AAA", dec!(5), dec!(110), dec!(1100)),
            holding("BBB", dec!(10), dec!(45), dec!(450)),
        ];
        let candidates = vec![candidate("AAA", dec!(110), dec!(1100)), candidate("CCC", dec!(50), dec!(950))];
        let outcome = rebalance(date(), 2, dec!(1000), marked, &candidates).unwrap();

        assert!(outcome.rebalanced);
        assert_eq!(outcome.changes.len(), 2);
        assert_eq!(outcome.changes[0].symbol, "CCC");
        assert_eq!(outcome.changes[0].change_type, ChangeType::Enter);
        assert_eq!(outcome.changes[0].market_cap, dec!(950));
        assert_eq!(outcome.changes[1].symbol, "BBB");
        assert_eq!(outcome.changes[1].change_type, ChangeType::Exit);
        assert_eq!(outcome.changes[1].market_cap, dec!(450));

        let aaa = &outcome.holdings[0];
        let ccc = &outcome.holdings[1];
        assert_eq!(aaa.shares, dec!(500) / dec!(110));
        assert_eq!(ccc.shares, dec!(10));
    }

    #[test]
    fn test_empty_candidates_cannot_be_weighted() {
        assert!(matches!(
            equal_weight(&[], dec!(1000)),
            Err(IndexError::Calculation(_))
        ));
    }
}

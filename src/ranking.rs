//! Final ranking of scored combinations
//!
//! Each strategy keeps its ten best results; the pooled lists are ordered by
//! overall score and deduplicated by combination signature.

use itertools::Itertools;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::cmp::Ordering;

use crate::catalog::{StrategyDefinition, TIE_BREAK_ATTRIBUTES};
use crate::types::ScoredResult;

/// Results kept per strategy
pub const TOP_PER_STRATEGY: usize = 10;

struct Candidate<'a> {
    result: &'a ScoredResult,
    signature: String,
}

impl<'a> Candidate<'a> {
    fn new(result: &'a ScoredResult) -> Self {
        Self {
            result,
            signature: result.signature(),
        }
    }
}

/// Higher score first, then higher tie-break `max` bounds, then the
/// lexicographically smaller signature
fn compare(a: &Candidate<'_>, a_score: f64, b: &Candidate<'_>, b_score: f64) -> Ordering {
    OrderedFloat(b_score)
        .cmp(&OrderedFloat(a_score))
        .then_with(|| compare_tie_breaks(a.result, b.result))
        .then_with(|| a.signature.cmp(&b.signature))
}

/// Per attribute, a present `max` bound beats an absent one and the higher
/// bound wins
fn compare_tie_breaks(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    TIE_BREAK_ATTRIBUTES
        .iter()
        .map(|key| {
            let a_max = a.combination.range_max(key).map(OrderedFloat);
            let b_max = b.combination.range_max(key).map(OrderedFloat);
            b_max.cmp(&a_max)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn by_overall(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    compare(a, a.result.overall_score, b, b.result.overall_score)
}

fn top_for_strategy<'a>(results: &'a [ScoredResult], name: &str) -> Vec<Candidate<'a>> {
    let mut scored: Vec<(f64, Candidate<'a>)> = results
        .iter()
        .filter_map(|r| {
            let score = r.strategy_score(name)?;
            (score.is_finite() && score > 0.0).then(|| (score, Candidate::new(r)))
        })
        .collect();

    scored.sort_by(|(a_score, a), (b_score, b)| compare(a, *a_score, b, *b_score));
    scored
        .into_iter()
        .take(TOP_PER_STRATEGY)
        .map(|(_, candidate)| candidate)
        .collect()
}

/// Per-strategy top lists, pooled, deduplicated and ordered.
///
/// Of several results sharing a signature, the one with the highest overall
/// score survives.
pub fn rank(results: &[ScoredResult], strategies: &[StrategyDefinition]) -> Vec<ScoredResult> {
    let per_strategy: Vec<Vec<Candidate<'_>>> = strategies
        .par_iter()
        .map(|strategy| top_for_strategy(results, strategy.name))
        .collect();

    let mut pooled: Vec<Candidate<'_>> = per_strategy.into_iter().flatten().collect();
    pooled.sort_by(by_overall);

    let mut unique: Vec<Candidate<'_>> = pooled
        .into_iter()
        .unique_by(|c| c.signature.clone())
        .collect();
    unique.sort_by(by_overall);

    unique.into_iter().map(|c| c.result.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::combination::{Combination, Constraint, NumericRange};
    use crate::types::{StrategyMetrics, StrategyScore};

    fn result(combination: Combination, overall: f64, pw_score: f64) -> ScoredResult {
        ScoredResult {
            combination,
            overall_score: overall,
            overall_trade_count: 10,
            strategies: vec![
                StrategyScore {
                    name: "1RR PW",
                    metrics: StrategyMetrics::default(),
                    score: pw_score,
                },
                StrategyScore {
                    name: "1RR STR",
                    metrics: StrategyMetrics::default(),
                    score: f64::NEG_INFINITY,
                },
            ],
        }
    }

    fn max_distance(max: f64) -> Combination {
        Combination::new().with(
            "Breakout_Distance",
            Constraint::Range(NumericRange::at_most(max)),
        )
    }

    #[test]
    fn test_orders_by_overall_score() {
        let results = vec![
            result(max_distance(2.0), 1.0, 1.0),
            result(max_distance(5.0), 3.0, 3.0),
            result(max_distance(7.5), 2.0, 2.0),
        ];
        let ranked = rank(&results, Catalog::global().strategies());
        let overall: Vec<f64> = ranked.iter().map(|r| r.overall_score).collect();
        assert_eq!(overall, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_non_positive_and_infinite_scores_excluded() {
        let results = vec![
            result(max_distance(2.0), 1.0, 0.0),
            result(max_distance(5.0), 1.0, -2.0),
            result(max_distance(7.5), 1.0, f64::NEG_INFINITY),
        ];
        assert!(rank(&results, Catalog::global().strategies()).is_empty());
    }

    #[test]
    fn test_tie_break_prefers_higher_max() {
        let results = vec![
            result(max_distance(5.0), 2.0, 2.0),
            result(max_distance(10.0), 2.0, 2.0),
            result(Combination::new(), 2.0, 2.0),
        ];
        let ranked = rank(&results, Catalog::global().strategies());
        let sigs: Vec<String> = ranked.iter().map(|r| r.signature()).collect();

        let ten = max_distance(10.0).signature();
        let five = max_distance(5.0).signature();
        let ten_pos = sigs.iter().position(|s| *s == ten).unwrap();
        let five_pos = sigs.iter().position(|s| *s == five).unwrap();
        assert!(ten_pos < five_pos);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn test_keeps_top_ten_per_strategy() {
        let results: Vec<ScoredResult> = (1..=15)
            .map(|i| result(max_distance(i as f64), i as f64, i as f64))
            .collect();
        let ranked = rank(&results, Catalog::global().strategies());
        assert_eq!(ranked.len(), TOP_PER_STRATEGY);
        assert_eq!(ranked[0].overall_score, 15.0);
        assert_eq!(ranked[9].overall_score, 6.0);
    }

    #[test]
    fn test_duplicate_signature_keeps_highest_overall() {
        let combo = max_distance(5.0);
        let results = vec![
            result(combo.clone(), 1.0, 4.0),
            result(combo.clone(), 3.0, 2.0),
        ];
        let ranked = rank(&results, Catalog::global().strategies());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].overall_score, 3.0);
    }

    #[test]
    fn test_missing_tie_break_bound_ranks_below_present_one() {
        let x = Combination::new()
            .with("Breakout_Distance", Constraint::Range(NumericRange::at_most(5.0)))
            .with("Candle_Size", Constraint::Range(NumericRange::at_most(2.0)));
        let y = Combination::new()
            .with("Breakout_Distance", Constraint::Range(NumericRange::at_most(2.0)))
            .with("Candle_Size", Constraint::Range(NumericRange::at_most(8.0)));
        let z = Combination::new().with("Candle_Size", Constraint::Range(NumericRange::at_most(5.0)));

        let results = vec![
            result(x.clone(), 2.0, 2.0),
            result(y.clone(), 2.0, 2.0),
            result(z.clone(), 2.0, 2.0),
        ];
        let mut reversed = results.clone();
        reversed.reverse();

        let strategies = Catalog::global().strategies();
        let forward = rank(&results, strategies);
        let backward = rank(&reversed, strategies);

        let expected = vec![x.signature(), y.signature(), z.signature()];
        let sigs: Vec<String> = forward.iter().map(|r| r.signature()).collect();
        assert_eq!(sigs, expected);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_rank_independent_of_input_order_on_ties() {
        let bounds = [None, Some(1.0), Some(3.0)];
        let mut results = Vec::new();
        for bd in bounds {
            for cs in bounds {
                for ed in bounds {
                    let mut combination = Combination::new();
                    for (key, max) in [
                        ("Breakout_Distance", bd),
                        ("Candle_Size", cs),
                        ("Entry_Distance", ed),
                    ] {
                        if let Some(max) = max {
                            combination = combination
                                .with(key, Constraint::Range(NumericRange::at_most(max)));
                        }
                    }
                    results.push(result(combination, 1.0, 1.0));
                }
            }
        }

        let strategies = Catalog::global().strategies();
        let forward = rank(&results, strategies);
        results.reverse();
        let backward = rank(&results, strategies);
        results.rotate_left(7);
        let rotated = rank(&results, strategies);

        assert_eq!(forward.len(), TOP_PER_STRATEGY);
        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
    }

    #[test]
    fn test_rank_is_idempotent() {
        let results: Vec<ScoredResult> = (1..=6)
            .map(|i| result(max_distance((i % 3) as f64), i as f64, 7.0 - i as f64))
            .collect();
        let strategies = Catalog::global().strategies();
        let once = rank(&results, strategies);
        let twice = rank(&once, strategies);
        assert_eq!(once, twice);
    }
}

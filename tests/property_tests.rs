//! Property tests for combination generation and ranking

use proptest::prelude::*;
use std::collections::HashSet;

use filter_optimizer::catalog::Catalog;
use filter_optimizer::combination::{NumericRange, TimeWindow};
use filter_optimizer::criterion::{CriterionSpec, RangeMode};
use filter_optimizer::generator::{self, MIN_WINDOW_MINUTES};
use filter_optimizer::ranking;
use filter_optimizer::{Combination, Constraint, ScoredResult, StrategyMetrics};
use filter_optimizer::types::StrategyScore;

// ── strategies ──────────────────────────────────────────────────────────────

const NUMERIC_KEYS: [&str; 4] = [
    "Candle_Size",
    "Breakout_Distance",
    "Entry_Distance",
    "Breakout_Candle_Count",
];

const FLAG_KEYS: [&str; 4] = [
    "Closed_In_LTA",
    "Gaussian_Trend_1",
    "M15_Candle",
    "Setup_Candle_Has_Wick",
];

fn range_mode() -> impl Strategy<Value = RangeMode> {
    prop_oneof![
        Just(RangeMode::Partition),
        Just(RangeMode::Permutation),
        Just(RangeMode::Max),
    ]
}

fn criterion() -> impl Strategy<Value = CriterionSpec> {
    prop_oneof![
        (0..FLAG_KEYS.len()).prop_map(|i| CriterionSpec::flag(FLAG_KEYS[i])),
        (
            0..NUMERIC_KEYS.len(),
            prop::collection::vec(prop::option::weighted(0.85, 0u8..40), 0..5),
            range_mode(),
        )
            .prop_map(|(i, raw, mode)| {
                let thresholds = raw.into_iter().map(|t| t.map(f64::from)).collect();
                CriterionSpec::numeric_range(NUMERIC_KEYS[i], thresholds, mode)
            }),
    ]
}

fn scored(combination: Combination, overall: f64, scores: [f64; 2]) -> ScoredResult {
    ScoredResult {
        combination,
        overall_score: overall,
        overall_trade_count: 5,
        strategies: vec![
            StrategyScore {
                name: "1RR PW",
                metrics: StrategyMetrics::default(),
                score: scores[0],
            },
            StrategyScore {
                name: "1RR STR",
                metrics: StrategyMetrics::default(),
                score: scores[1],
            },
        ],
    }
}

/// Scores from a small set so ties are common; each tie-break bound is
/// independently present or absent
fn scored_result() -> impl Strategy<Value = ScoredResult> {
    let score = || prop::sample::select(vec![-1.0, 0.0, 1.0, 2.0, 3.0]);
    (
        prop::option::of(0u8..4),
        prop::option::of(0u8..4),
        prop::option::of(0u8..4),
        score(),
        score(),
        score(),
    )
        .prop_map(|(breakout, candle, flag, overall, a, b)| {
            let mut combination = Combination::new();
            if let Some(max) = breakout {
                combination = combination.with(
                    "Breakout_Distance",
                    Constraint::Range(NumericRange::at_most(f64::from(max))),
                );
            }
            if let Some(max) = candle {
                combination = combination.with(
                    "Candle_Size",
                    Constraint::Range(NumericRange::at_most(f64::from(max))),
                );
            }
            if let Some(flag) = flag {
                combination = combination.with(FLAG_KEYS[usize::from(flag)], Constraint::Bool(true));
            }
            scored(combination, overall, [a, b])
        })
}

/// One result per combination, as the pipeline emits them, in two orders
fn shuffled_results() -> impl Strategy<Value = (Vec<ScoredResult>, Vec<ScoredResult>)> {
    prop::collection::vec(scored_result(), 0..60)
        .prop_map(|results| {
            let mut seen = HashSet::new();
            results
                .into_iter()
                .filter(|r| seen.insert(r.signature()))
                .collect::<Vec<_>>()
        })
        .prop_flat_map(|results| (Just(results.clone()), Just(results).prop_shuffle()))
}

// ── generation ──────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn base_count_is_product_of_expansions(criteria in prop::collection::vec(criterion(), 0..4)) {
        let expected: u64 = criteria.iter().map(|c| c.expand().len() as u64).product();

        let mut emitted = Vec::new();
        let count = generator::generate_base(&criteria, |c| {
            emitted.push(c);
            true
        });

        prop_assert_eq!(count, expected);
        prop_assert_eq!(emitted.len() as u64, expected);
        prop_assert_eq!(generator::count_base(&criteria), expected);
    }

    #[test]
    fn derived_combinations_never_alias_parent(
        max in 0.0f64..50.0,
        flag in any::<bool>(),
    ) {
        let parent = Combination::new().with("Closed_In_LTA", Constraint::Bool(flag));
        let before = parent.clone();

        let child = parent.with("Candle_Size", Constraint::Range(NumericRange::at_most(max)));
        let grandchild = child.with("Closed_In_LTA", Constraint::Bool(!flag));

        prop_assert_eq!(&parent, &before);
        prop_assert_eq!(child.get("Closed_In_LTA"), Some(&Constraint::Bool(flag)));
        prop_assert_eq!(grandchild.get("Closed_In_LTA"), Some(&Constraint::Bool(!flag)));
        prop_assert!(!parent.contains_key("Candle_Size"));
    }

    #[test]
    fn windows_keep_base_and_stay_valid(
        start in 0i32..1200,
        width in 15i32..240,
        min_shift in -3i32..=0,
        max_shift in 0i32..=3,
        step in prop::sample::select(vec![15, 30, 45, 60, 90]),
    ) {
        let end = start + width;
        let windows = generator::generate_windows(
            start,
            end,
            f64::from(min_shift),
            f64::from(max_shift),
            step,
        );

        prop_assert_eq!(windows.first(), Some(&TimeWindow::new(start, end)));

        let mut seen = HashSet::new();
        for window in &windows {
            let (min, max) = (window.min_minutes.unwrap(), window.max_minutes.unwrap());
            prop_assert!(seen.insert((min, max)), "duplicate window {:?}", window);
            if (min, max) != (start, end) {
                prop_assert!(min < max);
                prop_assert!(max - min >= MIN_WINDOW_MINUTES);
            }
        }
    }
}

// ── ranking ─────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ranking_is_idempotent_and_unique((results, shuffled) in shuffled_results()) {
        let strategies = Catalog::global().strategies();

        let once = ranking::rank(&results, strategies);
        let twice = ranking::rank(&once, strategies);
        prop_assert_eq!(&once, &twice);

        let from_shuffled = ranking::rank(&shuffled, strategies);
        prop_assert_eq!(&once, &from_shuffled);

        let signatures: HashSet<String> = once.iter().map(ScoredResult::signature).collect();
        prop_assert_eq!(signatures.len(), once.len());

        for pair in once.windows(2) {
            prop_assert!(pair[0].overall_score >= pair[1].overall_score);
        }
    }
}

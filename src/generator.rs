//! Search space generation
//!
//! Base combinations are streamed depth-first into a caller-supplied sink so
//! the full product never sits in memory. Time-window augmentation is a
//! separate step applied per base combination.

use std::collections::HashSet;

use crate::combination::{Combination, Constraint, TimeWindow, TIME_FILTER_KEY};
use crate::criterion::{ConstraintValue, CriterionSpec};

/// Windows narrower than this are never generated
pub const MIN_WINDOW_MINUTES: i32 = 15;

/// Number of base combinations `generate_base` will emit
pub fn count_base(criteria: &[CriterionSpec]) -> u64 {
    criteria
        .iter()
        .map(|c| c.expand().len() as u64)
        .fold(1, u64::saturating_mul)
}

/// Number of jobs after time-window augmentation
pub fn count_jobs(base_count: u64, windows: &[TimeWindow]) -> u64 {
    base_count.saturating_mul(windows.len().max(1) as u64)
}

/// Stream every base combination into `sink`.
///
/// Generation stops early once `sink` returns `false`. Returns the number of
/// combinations accepted by the sink.
pub fn generate_base<F>(criteria: &[CriterionSpec], mut sink: F) -> u64
where
    F: FnMut(Combination) -> bool,
{
    let expansions: Vec<(&str, Vec<ConstraintValue>)> = criteria
        .iter()
        .map(|c| (c.key.as_str(), c.expand()))
        .collect();

    let mut emitted = 0;
    descend(&expansions, Combination::new(), &mut sink, &mut emitted);
    emitted
}

/// Returns `false` once the sink has refused a combination
fn descend<F>(
    expansions: &[(&str, Vec<ConstraintValue>)],
    current: Combination,
    sink: &mut F,
    emitted: &mut u64,
) -> bool
where
    F: FnMut(Combination) -> bool,
{
    let Some(((key, values), rest)) = expansions.split_first() else {
        if sink(current) {
            *emitted += 1;
            return true;
        }
        return false;
    };

    for value in values {
        let next = match value {
            ConstraintValue::Any => current.clone(),
            ConstraintValue::Is(constraint) => current.with(*key, constraint.clone()),
        };
        if !descend(rest, next, sink, emitted) {
            return false;
        }
    }
    true
}

/// Shifted variants of a base window, base window first.
///
/// Start and end are shifted independently by every offset in
/// `[min_shift_hours*60, max_shift_hours*60]` stepped by `step_minutes`.
/// Shifted windows must keep `min < max` and span at least
/// [`MIN_WINDOW_MINUTES`].
pub fn generate_windows(
    base_min: i32,
    base_max: i32,
    min_shift_hours: f64,
    max_shift_hours: f64,
    step_minutes: i32,
) -> Vec<TimeWindow> {
    let base = TimeWindow::new(base_min, base_max);
    let mut seen = HashSet::from([(base_min, base_max)]);
    let mut windows = vec![base];

    if step_minutes <= 0 {
        return windows;
    }

    let from = (min_shift_hours * 60.0).round() as i32;
    let to = (max_shift_hours * 60.0).round() as i32;
    let offsets: Vec<i32> = (from..=to).step_by(step_minutes as usize).collect();

    for &start_offset in &offsets {
        for &end_offset in &offsets {
            let min = base_min + start_offset;
            let max = base_max + end_offset;
            if min >= max || max - min < MIN_WINDOW_MINUTES {
                continue;
            }
            if seen.insert((min, max)) {
                windows.push(TimeWindow::new(min, max));
            }
        }
    }
    windows
}

/// Jobs derived from one base combination.
///
/// Without windows the base combination is the only job.
pub fn augment<'a>(
    base: Combination,
    windows: &'a [TimeWindow],
) -> Box<dyn Iterator<Item = Combination> + Send + 'a> {
    if windows.is_empty() {
        return Box::new(std::iter::once(base));
    }
    Box::new(
        windows
            .iter()
            .map(move |w| base.with(TIME_FILTER_KEY, Constraint::Window(*w))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::RangeMode;

    fn collect(criteria: &[CriterionSpec]) -> Vec<Combination> {
        let mut out = Vec::new();
        generate_base(criteria, |c| {
            out.push(c);
            true
        });
        out
    }

    #[test]
    fn test_no_criteria_emits_single_empty_combination() {
        let combos = collect(&[]);
        assert_eq!(combos, vec![Combination::new()]);
        assert_eq!(count_base(&[]), 1);
    }

    #[test]
    fn test_wildcard_leaves_key_absent() {
        let combos = collect(&[CriterionSpec::flag("Closed_In_LTA")]);
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[0].get("Closed_In_LTA"), Some(&Constraint::Bool(true)));
        assert!(combos[1].is_empty());
    }

    #[test]
    fn test_count_matches_product() {
        let criteria = vec![
            CriterionSpec::flag("Gaussian_Trend_1"),
            CriterionSpec::flag("Gaussian_Trend_2"),
            CriterionSpec::numeric_range(
                "Candle_Size",
                vec![Some(2.0), Some(5.0), Some(8.0), None],
                RangeMode::Partition,
            ),
        ];
        assert_eq!(count_base(&criteria), 2 * 2 * 5);
        assert_eq!(collect(&criteria).len(), 20);
    }

    #[test]
    fn test_sink_refusal_stops_generation() {
        let criteria = vec![
            CriterionSpec::flag("Gaussian_Trend_1"),
            CriterionSpec::flag("Gaussian_Trend_2"),
        ];
        let mut seen = 0;
        let emitted = generate_base(&criteria, |_| {
            seen += 1;
            seen < 2
        });
        assert_eq!(emitted, 1);
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_windows_for_one_hour_base() {
        let windows = generate_windows(540, 600, -1.0, 1.0, 60);

        assert_eq!(windows[0], TimeWindow::new(540, 600));
        let pairs: HashSet<_> = windows
            .iter()
            .map(|w| (w.min_minutes.unwrap(), w.max_minutes.unwrap()))
            .collect();
        assert_eq!(pairs.len(), windows.len());

        for (min, max) in &pairs {
            assert!(min < max);
            assert!(max - min >= MIN_WINDOW_MINUTES);
        }
        // starts {480,540,600} x ends {540,600,660}: three invalid, one is the base
        assert_eq!(windows.len(), 6);
        assert!(pairs.contains(&(480, 660)));
        assert!(!pairs.contains(&(600, 600)));
    }

    #[test]
    fn test_non_positive_step_yields_base_only() {
        assert_eq!(generate_windows(540, 600, -1.0, 1.0, 0).len(), 1);
    }

    #[test]
    fn test_augment() {
        let base = Combination::new().with("Closed_In_LTA", Constraint::Bool(true));

        let untouched: Vec<_> = augment(base.clone(), &[]).collect();
        assert_eq!(untouched, vec![base.clone()]);

        let windows = generate_windows(540, 600, -1.0, 1.0, 60);
        let jobs: Vec<_> = augment(base.clone(), &windows).collect();
        assert_eq!(jobs.len(), windows.len());
        assert!(jobs.iter().all(|j| j.contains_key(TIME_FILTER_KEY)));
        assert!(!base.contains_key(TIME_FILTER_KEY));
        assert_eq!(count_jobs(3, &windows), 3 * windows.len() as u64);
        assert_eq!(count_jobs(3, &[]), 3);
    }
}

//! Filter engine
//!
//! [`apply`] narrows the trade set to the trades matching one combination.
//! [`prefilter`] runs once per run, before any combination is tried.

use rayon::prelude::*;
use tracing::debug;

use crate::attributes::{self, Attribute, AttributeKind, AttributeValue};
use crate::catalog::RANGE_RESTRICTED_KEY;
use crate::combination::{
    Combination, Constraint, TimeWindow, DIRECTION_SEPARATOR, TIME_FILTER_KEY, TIME_WINDOW_KEY,
};
use crate::error::EvalError;
use crate::types::{Direction, TradeRecord};

/// Trades passing a combination
#[derive(Debug)]
pub struct FilterOutcome<'t> {
    pub trades: Vec<&'t TradeRecord>,
    /// The combination constrains the closed-in-range key
    pub range_restricted: bool,
}

/// A filter applied once per run
#[derive(Debug, Clone, PartialEq)]
pub enum PredefinedFilter {
    /// Boolean or text equality on a column
    Exact { column: String, value: Constraint },
    /// Minute-of-day window on the trade time
    TimeRange { column: String, window: TimeWindow },
}

enum Check<'c> {
    Time(TimeWindow),
    Attribute(&'static Attribute, &'c Constraint),
    Directional {
        buy: &'static Attribute,
        sell: &'static Attribute,
        constraint: &'c Constraint,
    },
}

/// Resolve every key once so the per-trade loop does no lookups
fn compile(combination: &Combination) -> Result<Vec<Check<'_>>, EvalError> {
    let mut checks = Vec::with_capacity(combination.len());
    for (key, constraint) in combination.iter() {
        match key {
            TIME_WINDOW_KEY => continue,
            TIME_FILTER_KEY => match constraint {
                Constraint::Window(window) => checks.push(Check::Time(*window)),
                other => {
                    return Err(EvalError::TypeMismatch {
                        attribute: key.to_string(),
                        expected: "time window",
                        actual: other.kind_label(),
                    })
                }
            },
            _ => match key.split_once(DIRECTION_SEPARATOR) {
                Some((buy, sell)) => checks.push(Check::Directional {
                    buy: resolve(buy, constraint)?,
                    sell: resolve(sell, constraint)?,
                    constraint,
                }),
                None => checks.push(Check::Attribute(resolve(key, constraint)?, constraint)),
            },
        }
    }
    Ok(checks)
}

fn resolve(name: &str, constraint: &Constraint) -> Result<&'static Attribute, EvalError> {
    let attribute =
        attributes::lookup(name).ok_or_else(|| EvalError::UnknownAttribute(name.to_string()))?;

    let compatible = matches!(
        (constraint, attribute.kind),
        (Constraint::Bool(_), AttributeKind::Bool)
            | (Constraint::Text(_), AttributeKind::Text)
            | (
                Constraint::Range(_),
                AttributeKind::Number | AttributeKind::Integer
            )
    );
    if !compatible {
        return Err(EvalError::TypeMismatch {
            attribute: name.to_string(),
            expected: constraint.kind_label(),
            actual: attribute.kind.label(),
        });
    }
    Ok(attribute)
}

fn satisfies(value: AttributeValue<'_>, constraint: &Constraint) -> bool {
    match (constraint, value) {
        (Constraint::Bool(expected), AttributeValue::Bool(actual)) => *expected == actual,
        (Constraint::Text(expected), AttributeValue::Text(actual)) => expected == actual,
        (Constraint::Range(range), AttributeValue::Number(actual)) => range.contains(actual),
        _ => false,
    }
}

fn passes(trade: &TradeRecord, checks: &[Check<'_>]) -> Result<bool, EvalError> {
    for check in checks {
        let ok = match check {
            Check::Time(window) => window.contains(trade.minute_of_day()?),
            Check::Attribute(attribute, constraint) => satisfies(attribute.get(trade), constraint),
            Check::Directional {
                buy,
                sell,
                constraint,
            } => {
                let attribute = match trade.direction {
                    Direction::Buy => buy,
                    Direction::Sell => sell,
                };
                satisfies(attribute.get(trade), constraint)
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Trades satisfying every key of `combination`.
///
/// Errors on keys naming unknown attributes, constraints of the wrong type
/// for their attribute, and unparsable trade times under a time filter.
pub fn apply<'t>(
    trades: &'t [TradeRecord],
    combination: &Combination,
) -> Result<FilterOutcome<'t>, EvalError> {
    let checks = compile(combination)?;

    let mut kept = Vec::with_capacity(trades.len());
    for trade in trades {
        if passes(trade, &checks)? {
            kept.push(trade);
        }
    }

    Ok(FilterOutcome {
        trades: kept,
        range_restricted: combination.contains_key(RANGE_RESTRICTED_KEY),
    })
}

impl PredefinedFilter {
    /// Whether `trade` passes, or `None` when the filter cannot be applied
    /// to it (unknown column or incompatible type)
    fn check(&self, trade: &TradeRecord) -> Option<bool> {
        match self {
            PredefinedFilter::Exact { column, value } => {
                let attribute = attributes::lookup(column)?;
                match (value, attribute.get(trade)) {
                    (Constraint::Bool(expected), AttributeValue::Bool(actual)) => {
                        Some(*expected == actual)
                    }
                    (Constraint::Text(expected), AttributeValue::Text(actual)) => {
                        Some(expected == actual)
                    }
                    _ => None,
                }
            }
            PredefinedFilter::TimeRange { window, .. } => match trade.minute_of_day {
                Some(minute) => Some(window.contains(minute)),
                None => Some(false),
            },
        }
    }
}

/// Run-wide reduction of the trade set.
///
/// Drops trades that were never entered, then applies every predefined
/// filter. A filter that cannot be applied to a trade is skipped for that
/// trade. With `require_time`, trades whose time is unparsable are dropped.
pub fn prefilter(
    trades: Vec<TradeRecord>,
    filters: &[PredefinedFilter],
    require_time: bool,
) -> Vec<TradeRecord> {
    let total = trades.len();
    let kept: Vec<TradeRecord> = trades
        .into_par_iter()
        .filter(|trade| trade.entered)
        .filter(|trade| !require_time || trade.minute_of_day.is_some())
        .filter(|trade| filters.iter().all(|f| f.check(trade).unwrap_or(true)))
        .collect();

    debug!("Pre-filter kept {} of {} trades", kept.len(), total);
    kept
}

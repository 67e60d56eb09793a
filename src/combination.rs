//! Filter combinations
//!
//! A [`Combination`] is one point in the search space: a set of column
//! constraints applied jointly to the trade set. Combinations are never
//! mutated; [`Combination::with`] returns a copy carrying one more entry.

use serde::Serialize;
use std::collections::BTreeMap;

/// Reserved key holding a minute-of-day window
pub const TIME_FILTER_KEY: &str = "TimeFilter";

/// Reserved informational key, ignored when filtering
pub const TIME_WINDOW_KEY: &str = "TimeWindow";

/// Separates the buy and sell attribute of a direction-dependent key
pub const DIRECTION_SEPARATOR: char = '|';

/// Numeric band; a missing bound is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NumericRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Minute-of-day window, bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_minutes: Option<i32>,
}

impl TimeWindow {
    pub fn new(min_minutes: i32, max_minutes: i32) -> Self {
        Self {
            min_minutes: Some(min_minutes),
            max_minutes: Some(max_minutes),
        }
    }

    pub fn contains(&self, minute: i32) -> bool {
        self.min_minutes.map_or(true, |min| minute >= min)
            && self.max_minutes.map_or(true, |max| minute <= max)
    }
}

/// One constraint value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Constraint {
    Bool(bool),
    Text(String),
    Range(NumericRange),
    Window(TimeWindow),
}

impl Constraint {
    pub fn kind_label(&self) -> &'static str {
        match self {
            Constraint::Bool(_) => "boolean",
            Constraint::Text(_) => "text",
            Constraint::Range(_) => "numeric range",
            Constraint::Window(_) => "time window",
        }
    }

    pub fn range(&self) -> Option<&NumericRange> {
        match self {
            Constraint::Range(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Combination {
    entries: BTreeMap<String, Constraint>,
}

impl Combination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of `self` with `key` set to `value`
    pub fn with(&self, key: impl Into<String>, value: Constraint) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(key.into(), value);
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Constraint> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Constraint)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Upper bound of a numeric-range entry
    pub fn range_max(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Constraint::range).and_then(|r| r.max)
    }

    /// Canonical serialization: JSON with keys in sorted order.
    ///
    /// Two combinations with equal entries always share a signature.
    pub fn signature(&self) -> String {
        serde_json::to_string(&self.entries).unwrap_or_default()
    }
}

impl FromIterator<(String, Constraint)> for Combination {
    fn from_iter<I: IntoIterator<Item = (String, Constraint)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_copies_parent() {
        let parent = Combination::new().with("Closed_In_LTA", Constraint::Bool(true));
        let child = parent.with("Candle_Size", Constraint::Range(NumericRange::at_most(5.0)));

        assert_eq!(parent.len(), 1);
        assert_eq!(child.len(), 2);
        assert!(!parent.contains_key("Candle_Size"));

        let overwritten = child.with("Closed_In_LTA", Constraint::Bool(false));
        assert_eq!(child.get("Closed_In_LTA"), Some(&Constraint::Bool(true)));
        assert_eq!(overwritten.get("Closed_In_LTA"), Some(&Constraint::Bool(false)));
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = Combination::new()
            .with("b", Constraint::Bool(true))
            .with("a", Constraint::Range(NumericRange::between(2.0, 5.0)));
        let b = Combination::new()
            .with("a", Constraint::Range(NumericRange::between(2.0, 5.0)))
            .with("b", Constraint::Bool(true));

        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature(), r#"{"a":{"min":2.0,"max":5.0},"b":true}"#);
    }

    #[test]
    fn test_serialization_shapes() {
        let combo = Combination::new()
            .with("Entry_Distance", Constraint::Range(NumericRange::at_most(7.5)))
            .with(TIME_FILTER_KEY, Constraint::Window(TimeWindow::new(540, 600)))
            .with("Setup", Constraint::Text("S1".into()));

        let json = serde_json::to_value(&combo).unwrap();
        assert_eq!(json["Entry_Distance"], serde_json::json!({"max": 7.5}));
        assert_eq!(
            json[TIME_FILTER_KEY],
            serde_json::json!({"minMinutes": 540, "maxMinutes": 600})
        );
        assert_eq!(json["Setup"], "S1");
        assert_eq!(Combination::new().signature(), "{}");
    }

    #[test]
    fn test_range_and_window_bounds_are_inclusive() {
        let range = NumericRange::between(2.0, 5.0);
        assert!(range.contains(2.0));
        assert!(range.contains(5.0));
        assert!(!range.contains(5.01));
        assert!(NumericRange::at_least(8.0).contains(100.0));
        assert!(NumericRange::default().contains(-1.0));

        let window = TimeWindow::new(540, 600);
        assert!(window.contains(540));
        assert!(window.contains(600));
        assert!(!window.contains(601));
    }

    #[test]
    fn test_range_max() {
        let combo = Combination::new()
            .with("Candle_Size", Constraint::Range(NumericRange::between(2.0, 8.0)))
            .with("Entry_Distance", Constraint::Range(NumericRange::at_least(5.0)))
            .with("Closed_In_LTA", Constraint::Bool(true));

        assert_eq!(combo.range_max("Candle_Size"), Some(8.0));
        assert_eq!(combo.range_max("Entry_Distance"), None);
        assert_eq!(combo.range_max("Closed_In_LTA"), None);
        assert_eq!(combo.range_max("Missing"), None);
    }
}

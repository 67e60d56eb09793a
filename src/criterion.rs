//! Filter dimensions and their expansion into constraint values

use itertools::Itertools;

use crate::attributes;
use crate::combination::{Constraint, NumericRange, DIRECTION_SEPARATOR};
use crate::error::ConfigError;

/// How numeric thresholds become ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeMode {
    /// Contiguous buckets covering the whole number line
    #[default]
    Partition,
    /// Every `min < max` pair of thresholds
    Permutation,
    /// Every threshold as an upper bound alone
    Max,
}

impl RangeMode {
    pub fn from_label(label: &str) -> Self {
        match label {
            "PERMUTATION" => RangeMode::Permutation,
            "MAX" => RangeMode::Max,
            _ => RangeMode::Partition,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CriterionKind {
    /// Explicit values; `None` is the wildcard
    Exact { test_values: Vec<Option<Constraint>> },
    /// Thresholds; a `None` threshold adds the wildcard
    NumericRange {
        thresholds: Vec<Option<f64>>,
        mode: RangeMode,
    },
}

/// One expanded value of a criterion
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintValue {
    /// Leave the key unconstrained
    Any,
    Is(Constraint),
}

/// One filterable dimension.
///
/// `key` is an attribute name, or `"A|B"` for a direction-dependent pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionSpec {
    pub key: String,
    pub kind: CriterionKind,
}

impl CriterionSpec {
    pub fn exact(key: impl Into<String>, test_values: Vec<Option<Constraint>>) -> Self {
        Self {
            key: key.into(),
            kind: CriterionKind::Exact { test_values },
        }
    }

    /// `[true, any]`, the shape of every flag criterion
    pub fn flag(key: impl Into<String>) -> Self {
        Self::exact(key, vec![Some(Constraint::Bool(true)), None])
    }

    pub fn numeric_range(
        key: impl Into<String>,
        thresholds: Vec<Option<f64>>,
        mode: RangeMode,
    ) -> Self {
        Self {
            key: key.into(),
            kind: CriterionKind::NumericRange { thresholds, mode },
        }
    }

    /// Attribute names referenced by the key
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.key.split(DIRECTION_SEPARATOR)
    }

    /// Expand into the ordered constraint values to try
    pub fn expand(&self) -> Vec<ConstraintValue> {
        match &self.kind {
            CriterionKind::Exact { test_values } => {
                if test_values.is_empty() {
                    return vec![ConstraintValue::Any];
                }
                test_values
                    .iter()
                    .map(|v| match v {
                        Some(c) => ConstraintValue::Is(c.clone()),
                        None => ConstraintValue::Any,
                    })
                    .collect()
            }
            CriterionKind::NumericRange { thresholds, mode } => {
                expand_thresholds(thresholds, *mode)
            }
        }
    }

    /// Reject criteria that would break generation or filtering
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = self
            .attribute_names()
            .find(|name| attributes::lookup(name).is_none())
        {
            return Err(ConfigError::UnknownAttribute(name.to_string()));
        }
        if self.expand().is_empty() {
            return Err(ConfigError::EmptyExpansion(self.key.clone()));
        }
        Ok(())
    }
}

fn expand_thresholds(thresholds: &[Option<f64>], mode: RangeMode) -> Vec<ConstraintValue> {
    let has_wildcard = thresholds.iter().any(Option::is_none);
    let mut sorted: Vec<f64> = thresholds.iter().flatten().copied().collect();
    sorted.sort_by(f64::total_cmp);

    let ranges: Vec<NumericRange> = match mode {
        RangeMode::Permutation => sorted
            .iter()
            .tuple_combinations()
            .map(|(&min, &max)| NumericRange::between(min, max))
            .collect(),
        RangeMode::Max => sorted.iter().map(|&max| NumericRange::at_most(max)).collect(),
        RangeMode::Partition => match (sorted.first(), sorted.last()) {
            (Some(&first), Some(&last)) => std::iter::once(NumericRange::at_most(first))
                .chain(
                    sorted
                        .iter()
                        .tuple_windows()
                        .map(|(&min, &max)| NumericRange::between(min, max)),
                )
                .chain(std::iter::once(NumericRange::at_least(last)))
                .collect(),
            _ => Vec::new(),
        },
    };

    has_wildcard
        .then_some(ConstraintValue::Any)
        .into_iter()
        .chain(ranges.into_iter().map(|r| ConstraintValue::Is(Constraint::Range(r))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(values: &[ConstraintValue]) -> Vec<NumericRange> {
        values
            .iter()
            .filter_map(|v| match v {
                ConstraintValue::Is(Constraint::Range(r)) => Some(*r),
                _ => None,
            })
            .collect()
    }

    fn thresholds() -> Vec<Option<f64>> {
        vec![Some(8.0), Some(2.0), Some(5.0), None]
    }

    #[test]
    fn test_permutation_mode() {
        let spec = CriterionSpec::numeric_range("Candle_Size", thresholds(), RangeMode::Permutation);
        let values = spec.expand();

        assert_eq!(values.len(), 4);
        assert_eq!(values[0], ConstraintValue::Any);
        assert_eq!(
            ranges(&values),
            vec![
                NumericRange::between(2.0, 5.0),
                NumericRange::between(2.0, 8.0),
                NumericRange::between(5.0, 8.0),
            ]
        );
    }

    #[test]
    fn test_max_mode() {
        let spec = CriterionSpec::numeric_range("Entry_Distance", thresholds(), RangeMode::Max);
        let values = spec.expand();

        assert_eq!(values.len(), 4);
        assert_eq!(values[0], ConstraintValue::Any);
        assert_eq!(
            ranges(&values),
            vec![
                NumericRange::at_most(2.0),
                NumericRange::at_most(5.0),
                NumericRange::at_most(8.0),
            ]
        );
    }

    #[test]
    fn test_partition_mode() {
        let spec = CriterionSpec::numeric_range(
            "Candle_Size",
            thresholds(),
            RangeMode::from_label(""),
        );
        let values = spec.expand();

        assert_eq!(values.len(), 5);
        assert_eq!(values[0], ConstraintValue::Any);
        assert_eq!(
            ranges(&values),
            vec![
                NumericRange::at_most(2.0),
                NumericRange::between(2.0, 5.0),
                NumericRange::between(5.0, 8.0),
                NumericRange::at_least(8.0),
            ]
        );
    }

    #[test]
    fn test_wildcard_only_and_empty_thresholds() {
        let wildcard_only = CriterionSpec::numeric_range("Candle_Size", vec![None], RangeMode::Max);
        assert_eq!(wildcard_only.expand(), vec![ConstraintValue::Any]);

        let empty = CriterionSpec::numeric_range("Candle_Size", vec![], RangeMode::Partition);
        assert!(empty.expand().is_empty());
        assert!(matches!(
            empty.validate(),
            Err(ConfigError::EmptyExpansion(key)) if key == "Candle_Size"
        ));
    }

    #[test]
    fn test_single_threshold_permutation_is_wildcard_only() {
        let spec = CriterionSpec::numeric_range(
            "Candle_Size",
            vec![Some(3.0), None],
            RangeMode::Permutation,
        );
        assert_eq!(spec.expand(), vec![ConstraintValue::Any]);
    }

    #[test]
    fn test_exact_values_verbatim() {
        let spec = CriterionSpec::flag("Closed_In_LTA");
        assert_eq!(
            spec.expand(),
            vec![ConstraintValue::Is(Constraint::Bool(true)), ConstraintValue::Any]
        );

        let none_given = CriterionSpec::exact("Closed_In_LTA", vec![]);
        assert_eq!(none_given.expand(), vec![ConstraintValue::Any]);
    }

    #[test]
    fn test_validate_rejects_unknown_attribute() {
        let spec = CriterionSpec::numeric_range(
            "S2_Previous_Support_Distance|Nope",
            vec![Some(2.0)],
            RangeMode::Max,
        );
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::UnknownAttribute(name)) if name == "Nope"
        ));

        let pair = CriterionSpec::numeric_range(
            "S2_Previous_Support_Distance|S2_Previous_Resistance_Distance",
            vec![Some(2.0)],
            RangeMode::Max,
        );
        assert!(pair.validate().is_ok());
    }
}

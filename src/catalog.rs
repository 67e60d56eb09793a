//! Process-wide registry of selectable criteria groups and strategies
//!
//! Both lists are immutable and built on first use.

use std::sync::OnceLock;
use tracing::warn;

use crate::criterion::{CriterionSpec, RangeMode};
use crate::types::TradeRecord;

/// Key whose presence marks a combination as range-restricted
pub const RANGE_RESTRICTED_KEY: &str = "Closed_In_LTA";

/// Setup label that masks every non-S2 strategy
pub const S2_SETUP: &str = "S2";

/// Numeric-range keys whose upper bound breaks score ties, in priority order
pub const TIE_BREAK_ATTRIBUTES: [&str; 4] = [
    "Breakout_Distance",
    "Entry_Distance",
    "Candle_Size",
    "Breakout_Candle_Count",
];

/// One predefined trade-exit rule
#[derive(Debug, Clone)]
pub struct StrategyDefinition {
    pub name: &'static str,
    pub win_attribute: &'static str,
    pub target_attribute: &'static str,
    pub stop_attribute: &'static str,
    /// Evaluated only on range-restricted combinations, and only there
    pub range_restricted: bool,
    /// Kept when the run's predefined setup is S2
    pub s2: bool,
    pub is_win: fn(&TradeRecord) -> bool,
    pub target_pips: fn(&TradeRecord) -> f64,
    pub stop_pips: fn(&TradeRecord) -> f64,
}

/// A named group of criteria enabled together by `combinationsToTest`
#[derive(Debug, Clone)]
pub struct CriteriaGroup {
    pub name: &'static str,
    pub criteria: Vec<CriterionSpec>,
}

pub struct Catalog {
    groups: Vec<CriteriaGroup>,
    strategies: Vec<StrategyDefinition>,
}

impl Catalog {
    /// The shared registry
    pub fn global() -> &'static Catalog {
        static CATALOG: OnceLock<Catalog> = OnceLock::new();
        CATALOG.get_or_init(|| Catalog {
            groups: criteria_groups(),
            strategies: strategies(),
        })
    }

    pub fn strategies(&self) -> &[StrategyDefinition] {
        &self.strategies
    }

    pub fn groups(&self) -> &[CriteriaGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&CriteriaGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Criteria of the named groups, in catalog order.
    ///
    /// Unknown names are logged and skipped.
    pub fn enabled_criteria(&self, names: &[String]) -> Vec<CriterionSpec> {
        for name in names {
            if self.group(name).is_none() {
                warn!("Unknown combination '{}' in combinationsToTest, ignoring", name);
            }
        }

        self.groups
            .iter()
            .filter(|g| names.iter().any(|n| n == g.name))
            .flat_map(|g| g.criteria.iter().cloned())
            .collect()
    }
}

const DISTANCE_THRESHOLDS: [Option<f64>; 9] = [
    Some(2.0),
    Some(5.0),
    Some(7.5),
    Some(10.0),
    Some(12.5),
    Some(15.0),
    Some(20.0),
    Some(25.0),
    None,
];

fn flags(names: &[&str]) -> Vec<CriterionSpec> {
    names.iter().map(|n| CriterionSpec::flag(*n)).collect()
}

fn criteria_groups() -> Vec<CriteriaGroup> {
    vec![
        CriteriaGroup {
            name: "Gaussian",
            criteria: flags(&[
                "Gaussian_Trend_1",
                "Gaussian_Trend_2",
                "Gaussian_Trend_3",
                "Gaussian_Trend_4",
                "Gaussian_Trend_5",
                "Gaussian_Trend_6",
                "Gaussian_Trend_7",
            ]),
        },
        CriteriaGroup {
            name: "Candle Size Min Max",
            criteria: vec![CriterionSpec::numeric_range(
                "Candle_Size",
                vec![
                    Some(2.0),
                    Some(5.0),
                    Some(8.0),
                    Some(10.0),
                    Some(15.0),
                    Some(18.0),
                    Some(25.0),
                    None,
                ],
                RangeMode::Permutation,
            )],
        },
        CriteriaGroup {
            name: "Breakout Candle Count Max",
            criteria: vec![CriterionSpec::numeric_range(
                "Breakout_Candle_Count",
                vec![Some(1.0), Some(2.0), Some(3.0), None],
                RangeMode::Max,
            )],
        },
        CriteriaGroup {
            name: "Entry Distance Max",
            criteria: vec![CriterionSpec::numeric_range(
                "Entry_Distance",
                DISTANCE_THRESHOLDS.to_vec(),
                RangeMode::Max,
            )],
        },
        CriteriaGroup {
            name: "Breakout Distance Max",
            criteria: vec![CriterionSpec::numeric_range(
                "Breakout_Distance",
                DISTANCE_THRESHOLDS.to_vec(),
                RangeMode::Max,
            )],
        },
        CriteriaGroup {
            name: "Closed In LTA",
            criteria: flags(&[RANGE_RESTRICTED_KEY]),
        },
        CriteriaGroup {
            name: "Setup Candle Has Wick",
            criteria: flags(&["Setup_Candle_Has_Wick"]),
        },
        CriteriaGroup {
            name: "Candle Closed",
            criteria: flags(&[
                "M10_Candle",
                "M15_Candle",
                "M30_Candle",
                "H1_Candle",
                "H4_Candle",
                "D1_Candle",
            ]),
        },
        CriteriaGroup {
            name: "Candle Open",
            criteria: flags(&[
                "M10_Candle_Open",
                "M15_Candle_Open",
                "M30_Candle_Open",
                "H1_Candle_Open",
                "H4_Candle_Open",
                "D1_Candle_Open",
            ]),
        },
        CriteriaGroup {
            name: "S2 Pullback Distance Max",
            criteria: vec![CriterionSpec::numeric_range(
                "S2_Previous_Support_Distance|S2_Previous_Resistance_Distance",
                DISTANCE_THRESHOLDS.to_vec(),
                RangeMode::Max,
            )],
        },
    ]
}

macro_rules! strategy {
    ($name:literal, $win:ident / $win_col:literal, $tp:ident / $tp_col:literal,
     $sl:ident / $sl_col:literal, range = $range:literal, s2 = $s2:literal) => {
        StrategyDefinition {
            name: $name,
            win_attribute: $win_col,
            target_attribute: $tp_col,
            stop_attribute: $sl_col,
            range_restricted: $range,
            s2: $s2,
            is_win: |t| t.$win,
            target_pips: |t| t.$tp,
            stop_pips: |t| t.$sl,
        }
    };
}

fn strategies() -> Vec<StrategyDefinition> {
    vec![
        strategy!("1RR PW", tp_1rr_pw_win / "TP_1RR_PW_WIN",
            tp_1rr_pw_pips / "TP_1RR_PW_PIPS", sl_pw_pips / "SL_PW_PIPS",
            range = false, s2 = false),
        strategy!("1RR STR", tp_1rr_str_win / "TP_1RR_STR_WIN",
            tp_1rr_str_pips / "TP_1RR_STR_PIPS", sl_str_pips / "SL_STR_PIPS",
            range = false, s2 = false),
        strategy!("SR LTA SL PW", tp_sr_lta_sl_pw_win / "TP_SR_LTA_SL_PW_WIN",
            tp_sr_lta_pips / "TP_SR_LTA_PIPS", sl_pw_pips / "SL_PW_PIPS",
            range = true, s2 = false),
        strategy!("SR LTA SL STR", tp_sr_lta_sl_str_win / "TP_SR_LTA_SL_STR_WIN",
            tp_sr_lta_pips / "TP_SR_LTA_PIPS", sl_str_pips / "SL_STR_PIPS",
            range = true, s2 = false),
        strategy!("SR NEAR SL PW", tp_sr_nearest_sl_pw_win / "TP_SR_NEAREST_SL_PW_WIN",
            tp_sr_nearest_pips / "TP_SR_NEAREST_PIPS", sl_pw_pips / "SL_PW_PIPS",
            range = false, s2 = false),
        strategy!("SR NEAR SL STR", tp_sr_nearest_sl_str_win / "TP_SR_NEAREST_SL_STR_WIN",
            tp_sr_nearest_pips / "TP_SR_NEAREST_PIPS", sl_str_pips / "SL_STR_PIPS",
            range = false, s2 = false),
        strategy!("SR STATIC SL PW", tp_sr_static_sl_pw_win / "TP_SR_STATIC_SL_PW_WIN",
            tp_sr_static_pips / "TP_SR_STATIC_PIPS", sl_pw_pips / "SL_PW_PIPS",
            range = false, s2 = false),
        strategy!("SR STATIC SL STR", tp_sr_static_sl_str_win / "TP_SR_STATIC_SL_STR_WIN",
            tp_sr_static_pips / "TP_SR_STATIC_PIPS", sl_str_pips / "SL_STR_PIPS",
            range = false, s2 = false),
        strategy!("SR CURR SL PW", tp_sr_current_pw_win / "TP_SR_CURRENT_PW_WIN",
            tp_sr_current_pips / "TP_SR_CURRENT_PIPS", sl_pw_pips / "SL_PW_PIPS",
            range = false, s2 = true),
        strategy!("SR CURR SL STR", tp_sr_current_str_win / "TP_SR_CURRENT_STR_WIN",
            tp_sr_current_pips / "TP_SR_CURRENT_PIPS", sl_str_pips / "SL_STR_PIPS",
            range = false, s2 = true),
    ]
}

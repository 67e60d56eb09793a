//! Run configuration
//!
//! Settings are stored as JSON next to the configuration record and decoded
//! into [`Settings`]. A [`RunPlan`] is the validated form shared read-only by
//! every worker.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::combination::{Constraint, TimeWindow};
use crate::criterion::CriterionSpec;
use crate::error::ConfigError;
use crate::filter::PredefinedFilter;
use crate::generator;
use crate::metrics::{RankingWeights, StrategySettings};
use crate::time_of_day;

/// Column whose `timeRange` filter can seed time shifting
pub const TIME_COLUMN: &str = "Time";

const REQUIRED_SETTINGS: [&str; 5] = [
    "dataSheetName",
    "predefinedFilters",
    "combinationsToTest",
    "minTradeCount",
    "rankingWeights",
];

/// A stored configuration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub id: i64,
    pub name: String,
    pub settings: Value,
}

impl Configuration {
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        Settings::from_value(self.settings.clone())
    }
}

/// Time-shift search bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeShiftSettings {
    pub min_shift_hours: f64,
    pub max_shift_hours: f64,
    pub step_minutes: i64,
}

impl Default for TimeShiftSettings {
    fn default() -> Self {
        Self {
            min_shift_hours: -1.0,
            max_shift_hours: 1.0,
            step_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub data_sheet_name: String,
    /// Raw entries; malformed ones are skipped when the plan is built
    pub predefined_filters: Vec<Value>,
    pub combinations_to_test: Vec<String>,
    pub min_trade_count: f64,
    #[serde(rename = "minSLToTPRatio", default)]
    pub min_sl_to_tp_ratio: f64,
    #[serde(rename = "maxTPToSLRatio", default)]
    pub max_tp_to_sl_ratio: f64,
    /// Percent
    #[serde(default)]
    pub min_win_rate: f64,
    #[serde(default)]
    pub min_profit_factor: f64,
    #[serde(default)]
    pub predefined_setup: Option<String>,
    pub ranking_weights: RankingWeights,
    #[serde(default)]
    pub enable_time_shift: bool,
    #[serde(default)]
    pub time_shift: TimeShiftSettings,
}

impl Settings {
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        if let Some(missing) = REQUIRED_SETTINGS
            .iter()
            .find(|key| value.get(**key).map_or(true, Value::is_null))
        {
            return Err(ConfigError::MissingSetting(*missing));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Load settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents =
            fs::read_to_string(path.as_ref()).context("Failed to read settings file")?;
        let value: Value = serde_json::from_str(&contents).context("Failed to parse settings JSON")?;
        Ok(Self::from_value(value)?)
    }

    pub fn strategy_settings(&self) -> StrategySettings {
        StrategySettings {
            min_sl_to_tp_ratio: self.min_sl_to_tp_ratio,
            max_tp_to_sl_ratio: self.max_tp_to_sl_ratio,
            min_win_rate: self.min_win_rate,
            min_profit_factor: self.min_profit_factor,
            predefined_setup: self.predefined_setup.clone().unwrap_or_default(),
            min_trade_count: self.min_trade_count.max(0.0) as usize,
            weights: self.ranking_weights,
        }
    }
}

fn is_time_range_on_time(raw: &Value) -> bool {
    raw.get("columnHeader").and_then(Value::as_str) == Some(TIME_COLUMN)
        && raw.get("type").and_then(Value::as_str) == Some("timeRange")
}

fn bound<'a>(condition: &'a Value, key: &str) -> Option<&'a str> {
    condition.get(key).and_then(Value::as_str)
}

impl PredefinedFilter {
    /// Parse one `{columnHeader, type, condition}` entry
    pub fn parse(raw: &Value) -> Result<Self, String> {
        let column = raw
            .get("columnHeader")
            .and_then(Value::as_str)
            .ok_or("missing columnHeader")?
            .to_string();
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or("missing type")?;
        let condition = raw.get("condition").unwrap_or(&Value::Null);

        match kind {
            "exact" => {
                let value = match condition {
                    Value::Bool(b) => Constraint::Bool(*b),
                    Value::String(s) => Constraint::Text(s.clone()),
                    other => return Err(format!("unsupported exact condition {}", other)),
                };
                Ok(PredefinedFilter::Exact { column, value })
            }
            "timeRange" => {
                let parse = |key: &str| -> Result<Option<i32>, String> {
                    match bound(condition, key) {
                        None => Ok(None),
                        Some(text) => time_of_day::parse_minutes(text)
                            .map(Some)
                            .ok_or_else(|| format!("invalid {} '{}'", key, text)),
                    }
                };
                let window = TimeWindow {
                    min_minutes: parse("minMinutes")?,
                    max_minutes: parse("maxMinutes")?,
                };
                Ok(PredefinedFilter::TimeRange { column, window })
            }
            other => Err(format!("unknown filter type '{}'", other)),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            PredefinedFilter::Exact { column, .. } | PredefinedFilter::TimeRange { column, .. } => {
                column
            }
        }
    }
}

/// Everything a run needs, validated once before work starts
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub data_sheet_name: String,
    pub criteria: Vec<CriterionSpec>,
    /// Empty unless time shifting is active
    pub windows: Vec<TimeWindow>,
    pub predefined_filters: Vec<PredefinedFilter>,
    /// Trades must carry a parsable time
    pub require_trade_time: bool,
    pub settings: StrategySettings,
}

impl RunPlan {
    pub fn build(settings: &Settings, catalog: &Catalog) -> Result<Self, ConfigError> {
        let criteria = catalog.enabled_criteria(&settings.combinations_to_test);
        for criterion in &criteria {
            criterion.validate()?;
        }

        let mut raw_filters: Vec<&Value> = settings.predefined_filters.iter().collect();
        let mut windows = Vec::new();

        if settings.enable_time_shift {
            if let Some(index) = raw_filters.iter().position(|f| is_time_range_on_time(f)) {
                let raw = raw_filters.remove(index);
                windows = shifted_windows(raw, &settings.time_shift)?;
                info!("Time shift enabled: {} time windows", windows.len());
            } else {
                info!("Time shift enabled but no time range filter found");
            }
        }

        let predefined_filters = raw_filters
            .into_iter()
            .filter_map(|raw| match PredefinedFilter::parse(raw) {
                Ok(filter) => Some(filter),
                Err(e) => {
                    warn!("Skipping malformed predefined filter {}: {}", raw, e);
                    None
                }
            })
            .collect();

        Ok(RunPlan {
            data_sheet_name: settings.data_sheet_name.clone(),
            criteria,
            require_trade_time: !windows.is_empty(),
            windows,
            predefined_filters,
            settings: settings.strategy_settings(),
        })
    }

    pub fn base_combinations(&self) -> u64 {
        generator::count_base(&self.criteria)
    }

    pub fn total_jobs(&self) -> u64 {
        generator::count_jobs(self.base_combinations(), &self.windows)
    }
}

fn shifted_windows(raw: &Value, shift: &TimeShiftSettings) -> Result<Vec<TimeWindow>, ConfigError> {
    if shift.step_minutes <= 0 {
        return Err(ConfigError::NonPositiveStep(shift.step_minutes));
    }

    let condition = raw.get("condition").unwrap_or(&Value::Null);
    let parse = |key: &'static str| -> Result<i32, ConfigError> {
        let text = bound(condition, key).unwrap_or_default();
        time_of_day::parse_minutes(text).ok_or_else(|| ConfigError::InvalidTime {
            value: text.to_string(),
            context: key,
        })
    };
    let (min, max) = (parse("minMinutes")?, parse("maxMinutes")?);

    let step = i32::try_from(shift.step_minutes)
        .map_err(|_| ConfigError::NonPositiveStep(shift.step_minutes))?;
    Ok(generator::generate_windows(
        min,
        max,
        shift.min_shift_hours,
        shift.max_shift_hours,
        step,
    ))
}

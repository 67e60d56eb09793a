//! Core data types used across the optimizer

use serde::Serialize;
use std::collections::BTreeMap;

use crate::combination::Combination;
use crate::error::EvalError;
use crate::time_of_day;

/// Profit factor emitted in place of an infinite one
pub const PROFIT_FACTOR_SENTINEL: f64 = 9999.0;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Buy,
    Sell,
}

impl Direction {
    /// Anything other than "buy" (case-insensitive) is a sell
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("buy") {
            Direction::Buy
        } else {
            Direction::Sell
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

/// One historical trade outcome.
///
/// Loaded once per run and never mutated afterwards. Fields are addressed
/// by their column name through [`crate::attributes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeRecord {
    pub date: String,
    pub time: String,
    /// `time` parsed once at load; `None` when unparsable
    pub minute_of_day: Option<i32>,
    pub setup: String,
    pub direction: Direction,
    pub entered: bool,
    pub canceled_after_candles: i64,
    pub breakout_candle_count: i64,

    // Candle and distance measurements
    pub candle_size: f64,
    pub breakout_distance: f64,
    pub entry_distance: f64,
    pub entry_candle_has_wick: bool,
    pub setup_candle_has_wick: bool,
    pub closed_in_lta: bool,
    pub s2_previous_support_distance: f64,
    pub s2_previous_resistance_distance: f64,

    pub gaussian_trend_1: bool,
    pub gaussian_trend_2: bool,
    pub gaussian_trend_3: bool,
    pub gaussian_trend_4: bool,
    pub gaussian_trend_5: bool,
    pub gaussian_trend_6: bool,
    pub gaussian_trend_7: bool,

    // Per-strategy win flags
    pub tp_1rr_pw_win: bool,
    pub tp_1rr_str_win: bool,
    pub tp_sr_lta_sl_pw_win: bool,
    pub tp_sr_lta_sl_str_win: bool,
    pub tp_sr_nearest_sl_pw_win: bool,
    pub tp_sr_nearest_sl_str_win: bool,
    pub tp_sr_static_sl_pw_win: bool,
    pub tp_sr_static_sl_str_win: bool,
    pub tp_sr_current_pw_win: bool,
    pub tp_sr_current_str_win: bool,

    // Target and stop distances in pips
    pub tp_1rr_pw_pips: f64,
    pub tp_1rr_str_pips: f64,
    pub tp_sr_lta_pips: f64,
    pub tp_sr_nearest_pips: f64,
    pub tp_sr_static_pips: f64,
    pub tp_sr_current_pips: f64,
    pub sl_pw_pips: f64,
    pub sl_str_pips: f64,

    // Range breakout states
    pub lta_range_breakout: bool,
    pub nearest_range_breakout: bool,
    pub static_range_breakout: bool,
    pub current_range_breakout: bool,

    // Higher timeframe candle states
    pub m10_candle: bool,
    pub m15_candle: bool,
    pub m30_candle: bool,
    pub h1_candle: bool,
    pub h4_candle: bool,
    pub d1_candle: bool,
    pub m10_candle_open: bool,
    pub m15_candle_open: bool,
    pub m30_candle_open: bool,
    pub h1_candle_open: bool,
    pub h4_candle_open: bool,
    pub d1_candle_open: bool,
}

impl TradeRecord {
    /// Set the time of day, keeping the parsed minute in sync
    pub fn with_time(mut self, time: &str) -> Self {
        self.set_time(time.to_string());
        self
    }

    pub(crate) fn set_time(&mut self, time: String) {
        self.minute_of_day = time_of_day::parse_minutes(&time);
        self.time = time;
    }

    pub fn minute_of_day(&self) -> Result<i32, EvalError> {
        self.minute_of_day
            .ok_or_else(|| EvalError::UnparsableTime(self.time.clone()))
    }
}

/// Performance of one strategy under one combination
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrategyMetrics {
    pub win_rate: f64,
    /// `f64::INFINITY` when there were winning pips and no losing pips
    pub profit_factor: f64,
    pub total_trades: usize,
    pub net_profit: f64,
}

/// Metrics and composite score of one strategy
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyScore {
    pub name: &'static str,
    pub metrics: StrategyMetrics,
    /// `f64::NEG_INFINITY` when the strategy was discarded
    pub score: f64,
}

/// A combination that produced a finite overall score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub combination: Combination,
    pub overall_score: f64,
    pub overall_trade_count: usize,
    /// In catalog order
    pub strategies: Vec<StrategyScore>,
}

impl ScoredResult {
    pub fn strategy_score(&self, name: &str) -> Option<f64> {
        self.strategies
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.score)
    }

    pub fn signature(&self) -> String {
        self.combination.signature()
    }
}

/// Emitted metrics of one strategy
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRecord {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_trades_this_strategy: usize,
    pub net_profit: f64,
}

/// Output shape of one result.
///
/// Infinite values never reach the serializer: a negative-infinite overall
/// score becomes `0`, negative-infinite strategy scores become `null` and an
/// infinite profit factor becomes [`PROFIT_FACTOR_SENTINEL`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord<'a> {
    pub combination: &'a Combination,
    pub overall_score: f64,
    pub overall_trade_count: usize,
    pub metrics: BTreeMap<&'static str, MetricsRecord>,
    pub strategy_scores: BTreeMap<&'static str, Option<f64>>,
}

impl<'a> From<&'a ScoredResult> for ResultRecord<'a> {
    fn from(result: &'a ScoredResult) -> Self {
        let overall_score = if result.overall_score == f64::NEG_INFINITY {
            0.0
        } else {
            result.overall_score
        };

        let metrics = result
            .strategies
            .iter()
            .map(|s| {
                let profit_factor = if s.metrics.profit_factor == f64::INFINITY {
                    PROFIT_FACTOR_SENTINEL
                } else {
                    s.metrics.profit_factor
                };
                (
                    s.name,
                    MetricsRecord {
                        win_rate: s.metrics.win_rate,
                        profit_factor,
                        total_trades_this_strategy: s.metrics.total_trades,
                        net_profit: s.metrics.net_profit,
                    },
                )
            })
            .collect();

        let strategy_scores = result
            .strategies
            .iter()
            .map(|s| {
                let score = if s.score == f64::NEG_INFINITY {
                    None
                } else {
                    Some(s.score)
                };
                (s.name, score)
            })
            .collect();

        ResultRecord {
            combination: &result.combination,
            overall_score,
            overall_trade_count: result.overall_trade_count,
            metrics,
            strategy_scores,
        }
    }
}

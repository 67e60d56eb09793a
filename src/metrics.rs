//! Per-strategy metrics and composite scoring

use serde::{Deserialize, Serialize};

use crate::catalog::{StrategyDefinition, S2_SETUP};
use crate::combination::Combination;
use crate::error::EvalError;
use crate::filter;
use crate::types::{ScoredResult, StrategyMetrics, StrategyScore, TradeRecord};

/// Money risked per trade; a loss costs exactly this much
const RISK_PER_TRADE: f64 = 100.0;

/// Cap on the profit-factor sub-score
const MAX_PROFIT_FACTOR_SCORE: f64 = 10.0;

/// Weights of the composite score terms
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingWeights {
    pub profit_factor: f64,
    pub win_rate: f64,
    pub trade_count: f64,
    pub net_profit_pips: f64,
}

/// Thresholds shared by every job of a run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrategySettings {
    /// Lower bound on target/stop; 0 disables
    pub min_sl_to_tp_ratio: f64,
    /// Upper bound on target/stop; 0 disables
    pub max_tp_to_sl_ratio: f64,
    /// Percent
    pub min_win_rate: f64,
    pub min_profit_factor: f64,
    pub predefined_setup: String,
    pub min_trade_count: usize,
    pub weights: RankingWeights,
}

impl StrategySettings {
    fn accepts_ratio(&self, ratio: f64) -> bool {
        (self.min_sl_to_tp_ratio == 0.0 || ratio >= self.min_sl_to_tp_ratio)
            && (self.max_tp_to_sl_ratio == 0.0 || ratio <= self.max_tp_to_sl_ratio)
    }

    fn meets_thresholds(&self, metrics: &StrategyMetrics) -> bool {
        (metrics.profit_factor >= self.min_profit_factor
            || metrics.profit_factor == f64::INFINITY)
            && metrics.win_rate * 100.0 >= self.min_win_rate
    }
}

#[derive(Default)]
struct Tally {
    trades: usize,
    wins: usize,
    gross_profit: f64,
    gross_loss: f64,
}

impl Tally {
    fn add(&mut self, trade: &TradeRecord, strategy: &StrategyDefinition, settings: &StrategySettings) {
        let stop = (strategy.stop_pips)(trade);
        if stop == 0.0 {
            return;
        }
        let mut target = (strategy.target_pips)(trade);
        if target == 0.0 {
            target = stop;
        }
        if !settings.accepts_ratio(target / stop) || target < 1.0 {
            return;
        }

        self.trades += 1;
        if (strategy.is_win)(trade) {
            self.wins += 1;
            self.gross_profit += target * (RISK_PER_TRADE / stop);
        } else {
            self.gross_loss += RISK_PER_TRADE;
        }
    }

    fn into_metrics(self) -> StrategyMetrics {
        let win_rate = if self.trades > 0 {
            self.wins as f64 / self.trades as f64
        } else {
            0.0
        };
        let profit_factor = if self.gross_loss > 0.0 {
            self.gross_profit / self.gross_loss
        } else if self.gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        StrategyMetrics {
            win_rate,
            profit_factor,
            total_trades: self.trades,
            net_profit: self.gross_profit - self.gross_loss,
        }
    }
}

/// Metrics of every strategy, in catalog order.
///
/// Strategies whose range flag differs from `range_restricted` get zeroed
/// metrics, as do non-S2 strategies when the predefined setup is S2.
/// Returns `None` when no strategy meets both the win-rate and
/// profit-factor thresholds.
pub fn compute_metrics(
    trades: &[&TradeRecord],
    range_restricted: bool,
    settings: &StrategySettings,
    strategies: &[StrategyDefinition],
) -> Option<Vec<StrategyMetrics>> {
    let s2_only = settings.predefined_setup == S2_SETUP;

    let metrics: Vec<StrategyMetrics> = strategies
        .iter()
        .map(|strategy| {
            let mut tally = Tally::default();
            if strategy.range_restricted == range_restricted {
                for trade in trades {
                    tally.add(trade, strategy, settings);
                }
            }
            if s2_only && !strategy.s2 {
                tally = Tally::default();
            }
            tally.into_metrics()
        })
        .collect();

    let eligible = metrics.iter().any(|m| settings.meets_thresholds(m));
    eligible.then_some(metrics)
}

/// Weighted blend of profit factor, win rate, trade count and per-trade
/// net profit. `-inf` for strategies with no trades or a net loss.
pub fn composite_score(metrics: &StrategyMetrics, weights: &RankingWeights) -> f64 {
    if metrics.total_trades == 0 || metrics.net_profit < 0.0 {
        return f64::NEG_INFINITY;
    }

    let pf_score = if metrics.profit_factor == f64::INFINITY {
        MAX_PROFIT_FACTOR_SCORE
    } else if metrics.profit_factor.is_nan() {
        0.0
    } else {
        metrics.profit_factor.min(MAX_PROFIT_FACTOR_SCORE)
    };
    let trades = metrics.total_trades as f64;

    let score = pf_score * weights.profit_factor
        + metrics.win_rate * weights.win_rate
        + trades.ln_1p() * weights.trade_count
        + (metrics.net_profit / trades) * weights.net_profit_pips;

    if score.is_nan() {
        -1.0
    } else {
        score
    }
}

/// Mean of the finite scores; `-inf` when there are none
pub fn overall_score(scores: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = scores
        .into_iter()
        .filter(|s| s.is_finite())
        .fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));
    if count == 0 {
        f64::NEG_INFINITY
    } else {
        sum / count as f64
    }
}

/// Filter, measure and score one combination.
///
/// `Ok(None)` means the combination was evaluated and rejected.
pub fn evaluate(
    trades: &[TradeRecord],
    combination: &Combination,
    settings: &StrategySettings,
    strategies: &[StrategyDefinition],
) -> Result<Option<ScoredResult>, EvalError> {
    let outcome = filter::apply(trades, combination)?;
    if outcome.trades.len() < settings.min_trade_count {
        return Ok(None);
    }

    let Some(metrics) = compute_metrics(
        &outcome.trades,
        outcome.range_restricted,
        settings,
        strategies,
    ) else {
        return Ok(None);
    };

    let scores: Vec<StrategyScore> = strategies
        .iter()
        .zip(metrics)
        .map(|(strategy, metrics)| StrategyScore {
            name: strategy.name,
            score: composite_score(&metrics, &settings.weights),
            metrics,
        })
        .collect();

    let overall = overall_score(scores.iter().map(|s| s.score));
    if !overall.is_finite() {
        return Ok(None);
    }

    Ok(Some(ScoredResult {
        combination: combination.clone(),
        overall_score: overall,
        overall_trade_count: outcome.trades.len(),
        strategies: scores,
    }))
}

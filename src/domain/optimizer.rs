//! Grid-search strategy optimization.
//!
//! Candidate parameter values are generated with an integer step counter
//! (`start + i * step`) so repeated floating-point addition can never drift
//! past `end`. Candidates are mutually independent: each runs a complete
//! backtest on its own cloned strategy, scheduled on rayon's worker pool.
//! A failing candidate is logged and skipped; it never aborts the sweep.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

use crate::domain::backtest::{self, BacktestConfig};
use crate::domain::bar::Bar;
use crate::domain::cache::IndicatorCache;
use crate::domain::error::QuantbackError;
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::strategy::Strategy;

/// Which strategy parameter the sweep varies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeTarget {
    /// A named parameter of a named indicator, e.g. SMA `period`.
    IndicatorParam { indicator: String, parameter: String },
    Leverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub start: f64,
    pub end: f64,
}

/// Metric the sweep maximizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    NetProfit,
    WinRate,
    SharpeRatio,
    ComparedToBuyAndHold,
}

impl MetricKind {
    pub fn value(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            MetricKind::NetProfit => metrics.net_profit,
            MetricKind::WinRate => metrics.win_rate,
            MetricKind::SharpeRatio => metrics.sharpe_ratio,
            MetricKind::ComparedToBuyAndHold => metrics.compared_to_buy_and_hold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub target: OptimizeTarget,
    pub range: ParamRange,
    pub step: f64,
    pub metric: MetricKind,
    /// Evaluate candidates on the rayon pool; sequential when false.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

/// The winning candidate of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestConfiguration {
    pub parameter_value: f64,
    pub metric_value: f64,
    pub performance_metrics: PerformanceMetrics,
    pub strategy: Strategy,
}

/// Sweep the configured range and return the best-scoring configuration,
/// or `None` when no candidate's backtest succeeded.
///
/// `cancel` is checked once per candidate before its backtest starts, so a
/// cancellation lets in-flight work complete cleanly.
pub fn optimize(
    strategy: &Strategy,
    bars: &[Bar],
    config: &OptimizationConfig,
    backtest_config: &BacktestConfig,
    cache: &IndicatorCache,
    cancel: &AtomicBool,
) -> Result<Option<BestConfiguration>, QuantbackError> {
    validate_range(config)?;

    let candidates = candidate_values(&config.range, config.step);
    info!(
        strategy = %strategy.name,
        candidates = candidates.len(),
        metric = ?config.metric,
        "starting optimization sweep"
    );

    let evaluate = |&value: &f64| -> Option<(f64, PerformanceMetrics)> {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        let candidate = match apply_candidate(strategy, &config.target, value) {
            Ok(candidate) => candidate,
            Err(err) => {
                warn!(parameter_value = value, error = %err, "candidate rejected");
                return None;
            }
        };
        match backtest::run_backtest(&candidate, bars, backtest_config, cache) {
            Ok(result) => Some((value, result.performance_metrics)),
            Err(err) if err.is_candidate_skippable() => {
                warn!(parameter_value = value, error = %err, "candidate backtest failed, skipping");
                None
            }
            Err(err) => {
                error!(parameter_value = value, error = %err, "candidate backtest failed, skipping");
                None
            }
        }
    };

    let results: Vec<Option<(f64, PerformanceMetrics)>> = if config.parallel {
        candidates.par_iter().map(evaluate).collect()
    } else {
        candidates.iter().map(evaluate).collect()
    };

    // Select sequentially in candidate order: strictly-greater comparison
    // keeps the earliest-found configuration on ties.
    let mut best: Option<BestConfiguration> = None;
    for (value, metrics) in results.into_iter().flatten() {
        let metric_value = config.metric.value(&metrics);
        if best
            .as_ref()
            .map(|b| metric_value > b.metric_value)
            .unwrap_or(true)
        {
            // apply_candidate succeeded above for this value.
            let strategy = apply_candidate(strategy, &config.target, value)?;
            best = Some(BestConfiguration {
                parameter_value: value,
                metric_value,
                performance_metrics: metrics,
                strategy,
            });
        }
    }

    match &best {
        Some(found) => info!(
            parameter_value = found.parameter_value,
            metric_value = found.metric_value,
            "optimization complete"
        ),
        None => info!("optimization complete, no improvement found"),
    }

    Ok(best)
}

fn validate_range(config: &OptimizationConfig) -> Result<(), QuantbackError> {
    if !config.step.is_finite() || config.step <= 0.0 {
        return Err(QuantbackError::Validation {
            reason: format!("optimization step must be positive, got {}", config.step),
        });
    }
    if config.range.end < config.range.start {
        return Err(QuantbackError::Validation {
            reason: format!(
                "optimization range end {} is before start {}",
                config.range.end, config.range.start
            ),
        });
    }
    Ok(())
}

/// `start + i*step` for `i` in `0..=floor((end-start)/step)`, inclusive of
/// `end` up to a small tolerance against representation error.
fn candidate_values(range: &ParamRange, step: f64) -> Vec<f64> {
    let span = range.end - range.start;
    let count = (span / step + 1e-9).floor() as usize;
    (0..=count).map(|i| range.start + i as f64 * step).collect()
}

fn apply_candidate(
    strategy: &Strategy,
    target: &OptimizeTarget,
    value: f64,
) -> Result<Strategy, QuantbackError> {
    let mut candidate = strategy.clone();
    match target {
        OptimizeTarget::IndicatorParam {
            indicator,
            parameter,
        } => {
            let spec = candidate
                .indicators
                .iter_mut()
                .find(|spec| spec.name == *indicator)
                .ok_or_else(|| QuantbackError::Validation {
                    reason: format!(
                        "optimization target references unknown indicator {indicator}"
                    ),
                })?;
            spec.parameters.insert(parameter.clone(), value);
        }
        OptimizeTarget::Leverage => {
            candidate.risk.leverage = value;
        }
    }
    Ok(candidate)
}

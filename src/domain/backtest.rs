//! Backtest orchestration.
//!
//! A single backtest is a pure function of (strategy, bar sequence, config)
//! to a result record: validate, compute indicators through the cache,
//! simulate trades, run the risk pipeline, reduce to metrics, and derive
//! the per-bar equity/drawdown series for charting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::domain::bar::{self, Bar};
use crate::domain::cache::IndicatorCache;
use crate::domain::error::QuantbackError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::metrics::{self, PerformanceMetrics};
use crate::domain::risk;
use crate::domain::simulator::{self, Trade};
use crate::domain::strategy::Strategy;

/// One point of the visualization series: cumulative realized equity and
/// drawdown at a bar's timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity_value: f64,
    pub drawdown_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub performance_metrics: PerformanceMetrics,
    pub visualization_data: Vec<EquityPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub execution: ExecutionConfig,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            execution: ExecutionConfig::default(),
            risk_free_rate: 0.0,
        }
    }
}

/// Run one backtest over an already-fetched bar sequence.
///
/// Bars must be chronologically sorted (see [`bar::sort_bars`]); an empty
/// or unsorted sequence is rejected. Aborts on the first validation,
/// indicator, or computation failure.
pub fn run_backtest(
    strategy: &Strategy,
    bars: &[Bar],
    config: &BacktestConfig,
    cache: &IndicatorCache,
) -> Result<BacktestResult, QuantbackError> {
    strategy.validate()?;
    bar::validate_bars(bars, &strategy.asset_symbol, &strategy.time_frame)?;

    info!(
        strategy = %strategy.name,
        symbol = %strategy.asset_symbol,
        timeframe = %strategy.time_frame,
        bars = bars.len(),
        "starting backtest"
    );

    let closes = bar::close_prices(bars);
    let mut indicators: HashMap<String, IndicatorSeries> = HashMap::new();
    for spec in &strategy.indicators {
        let series =
            cache.series_for(&strategy.asset_symbol, &strategy.time_frame, spec, &closes)?;
        indicators.insert(spec.name.clone(), series);
    }

    let raw_trades = simulator::simulate_trades(bars, &indicators, strategy, &config.execution);
    let trades = risk::apply_risk_management(raw_trades, &strategy.risk);
    let performance_metrics = metrics::compute(&trades, bars, config.risk_free_rate);
    let visualization_data = equity_curve(bars, &trades);

    info!(
        strategy = %strategy.name,
        trades = trades.len(),
        net_profit = performance_metrics.net_profit,
        "backtest complete"
    );

    Ok(BacktestResult {
        trades,
        performance_metrics,
        visualization_data,
    })
}

/// One point per bar: equity is the summed profit of trades realized at or
/// before that bar, drawdown the gap to the running equity peak.
fn equity_curve(bars: &[Bar], trades: &[Trade]) -> Vec<EquityPoint> {
    let mut points = Vec::with_capacity(bars.len());
    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut next_trade = 0;

    for bar in bars {
        while next_trade < trades.len() && trades[next_trade].exit_timestamp <= bar.timestamp {
            equity += trades[next_trade].profit;
            next_trade += 1;
        }
        if equity > peak {
            peak = equity;
        }
        points.push(EquityPoint {
            timestamp: bar.timestamp,
            equity_value: equity,
            drawdown_value: peak - equity,
        });
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_cache::MemoryCacheStore;
    use crate::domain::execution::{OrderSide, OrderType};
    use crate::domain::indicator::IndicatorSpec;
    use crate::domain::rule::{CmpOp, Comparison, Operand, OrderSpec, TradeRule};
    use crate::domain::strategy::StrategyBuilder;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn sma_cross_strategy() -> Strategy {
        StrategyBuilder::new("SMA cross", "BTC/USDT", "1h")
            .indicator(IndicatorSpec::new("SMA", &[("period", 3.0)]))
            .entry_rule(TradeRule {
                comparisons: vec![Comparison {
                    left: Operand::Close,
                    op: CmpOp::GreaterThan,
                    right: Operand::Indicator("SMA".into()),
                }],
                order: OrderSpec {
                    side: OrderSide::Buy,
                    order_type: OrderType::Market,
                    quantity: 10.0,
                    price: None,
                },
            })
            .exit_rule(TradeRule {
                comparisons: vec![Comparison {
                    left: Operand::Close,
                    op: CmpOp::LessThan,
                    right: Operand::Indicator("SMA".into()),
                }],
                order: OrderSpec {
                    side: OrderSide::Sell,
                    order_type: OrderType::Market,
                    quantity: 10.0,
                    price: None,
                },
            })
            .build()
            .unwrap()
    }

    fn no_cost_config() -> BacktestConfig {
        BacktestConfig {
            execution: ExecutionConfig {
                slippage_pct: 0.0,
                commission: 0.0,
            },
            risk_free_rate: 0.0,
        }
    }

    fn cache() -> IndicatorCache {
        IndicatorCache::new(Arc::new(MemoryCacheStore::new()))
    }

    #[test]
    fn full_run_produces_trades_metrics_and_curve() {
        let bars = make_bars(&[10.0, 10.0, 10.0, 12.0, 8.0]);
        let result = run_backtest(&sma_cross_strategy(), &bars, &no_cost_config(), &cache())
            .unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.performance_metrics.total_trades, 1);
        assert_eq!(result.visualization_data.len(), bars.len());
    }

    #[test]
    fn empty_bars_is_data_unavailable() {
        let err =
            run_backtest(&sma_cross_strategy(), &[], &no_cost_config(), &cache()).unwrap_err();
        assert!(matches!(err, QuantbackError::DataUnavailable { .. }));
    }

    #[test]
    fn unsupported_indicator_aborts() {
        let mut strategy = sma_cross_strategy();
        strategy.indicators.push(IndicatorSpec::new("HULL", &[("period", 9.0)]));
        let bars = make_bars(&[10.0, 10.0, 10.0, 12.0, 8.0]);
        let err = run_backtest(&strategy, &bars, &no_cost_config(), &cache()).unwrap_err();
        assert!(matches!(err, QuantbackError::UnsupportedIndicator { .. }));
    }

    #[test]
    fn stripped_indicators_fail_validation() {
        let mut strategy = sma_cross_strategy();
        strategy.indicators.clear();
        let bars = make_bars(&[10.0, 10.0, 10.0]);
        let err = run_backtest(&strategy, &bars, &no_cost_config(), &cache()).unwrap_err();
        assert!(matches!(err, QuantbackError::Validation { .. }));
    }

    #[test]
    fn equity_curve_tracks_realized_profit() {
        let bars = make_bars(&[10.0, 10.0, 10.0, 12.0, 8.0]);
        let result =
            run_backtest(&sma_cross_strategy(), &bars, &no_cost_config(), &cache()).unwrap();

        let curve = &result.visualization_data;
        // Nothing realized before the exit bar.
        for point in curve.iter().take(4) {
            assert_relative_eq!(point.equity_value, 0.0);
        }
        // The losing trade realizes at the final bar: equity -40, drawdown 40.
        assert_relative_eq!(curve[4].equity_value, -40.0);
        assert_relative_eq!(curve[4].drawdown_value, 40.0);
    }

    #[test]
    fn deterministic_across_runs() {
        let bars = make_bars(&[10.0, 10.0, 10.0, 12.0, 8.0, 9.0, 9.0, 12.0, 7.0]);
        let strategy = sma_cross_strategy();
        let a = run_backtest(&strategy, &bars, &no_cost_config(), &cache()).unwrap();
        let b = run_backtest(&strategy, &bars, &no_cost_config(), &cache()).unwrap();
        assert_eq!(a, b);
    }
}

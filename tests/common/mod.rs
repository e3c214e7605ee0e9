#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use quantback::adapters::memory_cache::MemoryCacheStore;
use quantback::domain::backtest::BacktestConfig;
use quantback::domain::bar::Bar;
use quantback::domain::cache::IndicatorCache;
use quantback::domain::execution::{ExecutionConfig, OrderSide, OrderType};
use quantback::domain::indicator::IndicatorSpec;
use quantback::domain::rule::{CmpOp, Comparison, Operand, OrderSpec, TradeRule};
use quantback::domain::strategy::{Strategy, StrategyBuilder};

pub fn ts(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hour as i64)
}

pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: ts(i as u32),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        })
        .collect()
}

pub fn market_rule(side: OrderSide, comparison: Comparison) -> TradeRule {
    TradeRule {
        comparisons: vec![comparison],
        order: OrderSpec {
            side,
            order_type: OrderType::Market,
            quantity: 10.0,
            price: None,
        },
    }
}

pub fn close_vs_sma(op: CmpOp) -> Comparison {
    Comparison {
        left: Operand::Close,
        op,
        right: Operand::Indicator("SMA".into()),
    }
}

/// Buy when price breaks above SMA(3), sell when it falls below.
pub fn trend_strategy() -> Strategy {
    StrategyBuilder::new("SMA trend", "BTC/USDT", "1h")
        .indicator(IndicatorSpec::new("SMA", &[("period", 3.0)]))
        .entry_rule(market_rule(
            OrderSide::Buy,
            close_vs_sma(CmpOp::GreaterThan),
        ))
        .exit_rule(market_rule(OrderSide::Sell, close_vs_sma(CmpOp::LessThan)))
        .build()
        .unwrap()
}

/// Buy the dip below SMA(3), sell the recovery above it.
pub fn dip_buy_strategy() -> Strategy {
    StrategyBuilder::new("SMA dip buy", "BTC/USDT", "1h")
        .indicator(IndicatorSpec::new("SMA", &[("period", 3.0)]))
        .entry_rule(market_rule(OrderSide::Buy, close_vs_sma(CmpOp::LessThan)))
        .exit_rule(market_rule(
            OrderSide::Sell,
            close_vs_sma(CmpOp::GreaterThan),
        ))
        .build()
        .unwrap()
}

pub fn no_cost_config() -> BacktestConfig {
    BacktestConfig {
        execution: ExecutionConfig {
            slippage_pct: 0.0,
            commission: 0.0,
        },
        risk_free_rate: 0.0,
    }
}

pub fn fresh_cache() -> IndicatorCache {
    IndicatorCache::new(Arc::new(MemoryCacheStore::new()))
}

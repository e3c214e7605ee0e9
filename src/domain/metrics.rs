//! Performance statistics over the adjusted trade list.

use serde::{Deserialize, Serialize};

use crate::domain::bar::Bar;
use crate::domain::simulator::Trade;

/// Derived, read-only summary; recomputed fresh per backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub net_profit: f64,
    /// Percentage of trades with positive profit; 0 when there are none.
    pub win_rate: f64,
    /// Largest peak-to-trough fall of cumulative profit; never negative.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    /// Strategy return minus the return of holding the asset over the
    /// same window.
    pub compared_to_buy_and_hold: f64,
}

pub fn compute(trades: &[Trade], bars: &[Bar], risk_free_rate: f64) -> PerformanceMetrics {
    let net_profit: f64 = trades.iter().map(|t| t.profit).sum();

    let win_rate = if trades.is_empty() {
        0.0
    } else {
        let wins = trades.iter().filter(|t| t.profit > 0.0).count();
        100.0 * wins as f64 / trades.len() as f64
    };

    PerformanceMetrics {
        total_trades: trades.len(),
        net_profit,
        win_rate,
        max_drawdown: max_drawdown(trades),
        sharpe_ratio: sharpe_ratio(trades, risk_free_rate),
        compared_to_buy_and_hold: strategy_return(trades) - buy_and_hold_return(bars),
    }
}

/// Max over the chronological trade sequence of (running peak cumulative
/// profit − cumulative profit).
pub fn max_drawdown(trades: &[Trade]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;

    for trade in trades {
        cumulative += trade.profit;
        if cumulative > peak {
            peak = cumulative;
        }
        let drawdown = peak - cumulative;
        if drawdown > max_dd {
            max_dd = drawdown;
        }
    }

    max_dd
}

/// (mean per-trade return − risk-free rate) / population standard deviation
/// of per-trade returns; 0 when there is no variance.
pub fn sharpe_ratio(trades: &[Trade], risk_free_rate: f64) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }

    let returns: Vec<f64> = trades.iter().map(per_trade_return).collect();
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        (mean - risk_free_rate) / stddev
    } else {
        0.0
    }
}

fn per_trade_return(trade: &Trade) -> f64 {
    if trade.entry_price > 0.0 {
        trade.profit / trade.entry_price
    } else {
        0.0
    }
}

fn strategy_return(trades: &[Trade]) -> f64 {
    trades.iter().map(per_trade_return).sum()
}

/// Return of holding the asset across the window, from first/last close.
pub fn buy_and_hold_return(bars: &[Bar]) -> f64 {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) if first.close > 0.0 => {
            (last.close - first.close) / first.close
        }
        _ => 0.0,
    }
}

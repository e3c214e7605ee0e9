//! Risk-management pipeline over the realized trade list.
//!
//! Fixed stage order: leverage, drawdown gate, stop-loss/take-profit
//! attachment, diversification. Every stage is a pure transform that
//! tolerates an empty input list.

use tracing::warn;

use crate::domain::simulator::Trade;
use crate::domain::execution::OrderSide;
use crate::domain::strategy::{DiversificationRules, DrawdownPolicy, RiskConfig, StopValue};

/// Apply the full pipeline in order.
pub fn apply_risk_management(trades: Vec<Trade>, risk: &RiskConfig) -> Vec<Trade> {
    let trades = apply_leverage(trades, risk.leverage);
    let trades = match risk.max_drawdown_limit {
        Some(limit) => apply_drawdown_gate(trades, limit, risk.drawdown_policy),
        None => trades,
    };
    let trades = attach_stops(trades, risk.stop_loss, risk.take_profit);
    match &risk.diversification {
        Some(rules) => apply_diversification(trades, rules),
        None => trades,
    }
}

/// Scale a trade's size by `factor`. Price PnL scales with quantity;
/// commission is a fixed per-order cost and does not.
fn scale_quantity(trade: &mut Trade, factor: f64) {
    let gross = trade.gross_profit();
    trade.quantity *= factor;
    trade.profit = gross * factor - trade.commission;
}

pub fn apply_leverage(mut trades: Vec<Trade>, leverage: f64) -> Vec<Trade> {
    if (leverage - 1.0).abs() < f64::EPSILON {
        return trades;
    }
    for trade in &mut trades {
        scale_quantity(trade, leverage);
    }
    trades
}

/// Track running cumulative profit against its running peak; once the gap
/// exceeds `limit`, act per `policy`.
pub fn apply_drawdown_gate(
    trades: Vec<Trade>,
    limit: f64,
    policy: DrawdownPolicy,
) -> Vec<Trade> {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut breach_index = None;

    for (i, trade) in trades.iter().enumerate() {
        cumulative += trade.profit;
        if cumulative > peak {
            peak = cumulative;
        }
        if peak - cumulative > limit {
            breach_index = Some(i);
            break;
        }
    }

    let Some(breached_at) = breach_index else {
        return trades;
    };

    warn!(
        trade_index = breached_at,
        limit, "maximum drawdown limit exceeded"
    );

    match policy {
        DrawdownPolicy::Advisory => trades,
        DrawdownPolicy::Truncate => trades.into_iter().take(breached_at + 1).collect(),
    }
}

/// Compute stop-loss / take-profit prices per trade side. For a buy the
/// stop sits below entry and the target above; mirrored for a sell.
pub fn attach_stops(
    mut trades: Vec<Trade>,
    stop_loss: Option<StopValue>,
    take_profit: Option<StopValue>,
) -> Vec<Trade> {
    for trade in &mut trades {
        if let Some(sl) = stop_loss {
            let offset = sl.offset_from(trade.entry_price);
            trade.stop_loss_price = Some(match trade.side {
                OrderSide::Buy => trade.entry_price - offset,
                OrderSide::Sell => trade.entry_price + offset,
            });
        }
        if let Some(tp) = take_profit {
            let offset = tp.offset_from(trade.entry_price);
            trade.take_profit_price = Some(match trade.side {
                OrderSide::Buy => trade.entry_price + offset,
                OrderSide::Sell => trade.entry_price - offset,
            });
        }
    }
    trades
}

/// Cap any single trade's quantity at the configured maximum.
pub fn apply_diversification(mut trades: Vec<Trade>, rules: &DiversificationRules) -> Vec<Trade> {
    for trade in &mut trades {
        if trade.quantity > rules.max_quantity {
            let factor = rules.max_quantity / trade.quantity;
            scale_quantity(trade, factor);
        }
    }
    trades
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_trade(profit: f64) -> Trade {
        let entry = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Trade {
            side: OrderSide::Buy,
            entry_price: 100.0,
            exit_price: 100.0 + profit / 10.0,
            entry_timestamp: entry,
            exit_timestamp: entry + chrono::Duration::hours(1),
            quantity: 10.0,
            commission: 0.0,
            profit,
            stop_loss_price: None,
            take_profit_price: None,
            partial_fill: false,
        }
    }

    #[test]
    fn leverage_scales_quantity_and_profit() {
        let trades = apply_leverage(vec![make_trade(50.0)], 3.0);
        assert!((trades[0].quantity - 30.0).abs() < f64::EPSILON);
        assert!((trades[0].profit - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn leverage_does_not_scale_commission() {
        let mut trade = make_trade(50.0);
        trade.commission = 2.0;
        trade.profit = 48.0;
        let trades = apply_leverage(vec![trade], 2.0);
        // gross 50 doubles to 100, commission stays 2.
        assert!((trades[0].profit - 98.0).abs() < f64::EPSILON);
        assert!((trades[0].commission - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn drawdown_gate_advisory_passes_through() {
        let trades = vec![make_trade(100.0), make_trade(-80.0), make_trade(10.0)];
        let out = apply_drawdown_gate(trades.clone(), 50.0, DrawdownPolicy::Advisory);
        assert_eq!(out, trades);
    }

    #[test]
    fn drawdown_gate_truncate_drops_trailing_trades() {
        // Cumulative: 100, 20 (drawdown 80 > 50), breach at index 1.
        let trades = vec![make_trade(100.0), make_trade(-80.0), make_trade(10.0)];
        let out = apply_drawdown_gate(trades, 50.0, DrawdownPolicy::Truncate);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn drawdown_gate_within_limit_is_noop() {
        let trades = vec![make_trade(100.0), make_trade(-30.0)];
        let out = apply_drawdown_gate(trades.clone(), 50.0, DrawdownPolicy::Truncate);
        assert_eq!(out, trades);
    }

    #[test]
    fn attach_stops_buy_side() {
        let trades = attach_stops(
            vec![make_trade(0.0)],
            Some(StopValue::Percent(5.0)),
            Some(StopValue::Fixed(8.0)),
        );
        assert_eq!(trades[0].stop_loss_price, Some(95.0));
        assert_eq!(trades[0].take_profit_price, Some(108.0));
    }

    #[test]
    fn attach_stops_sell_side_mirrors() {
        let mut trade = make_trade(0.0);
        trade.side = OrderSide::Sell;
        let trades = attach_stops(
            vec![trade],
            Some(StopValue::Fixed(5.0)),
            Some(StopValue::Fixed(8.0)),
        );
        assert_eq!(trades[0].stop_loss_price, Some(105.0));
        assert_eq!(trades[0].take_profit_price, Some(92.0));
    }

    #[test]
    fn attach_stops_absent_values_leave_none() {
        let trades = attach_stops(vec![make_trade(0.0)], None, None);
        assert_eq!(trades[0].stop_loss_price, None);
        assert_eq!(trades[0].take_profit_price, None);
    }

    #[test]
    fn diversification_caps_quantity() {
        let rules = DiversificationRules { max_quantity: 4.0 };
        let trades = apply_diversification(vec![make_trade(50.0)], &rules);
        assert!((trades[0].quantity - 4.0).abs() < f64::EPSILON);
        assert!((trades[0].profit - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn diversification_leaves_small_trades_alone() {
        let rules = DiversificationRules { max_quantity: 100.0 };
        let trades = apply_diversification(vec![make_trade(50.0)], &rules);
        assert!((trades[0].quantity - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn every_stage_tolerates_empty_input() {
        assert!(apply_leverage(vec![], 2.0).is_empty());
        assert!(apply_drawdown_gate(vec![], 10.0, DrawdownPolicy::Truncate).is_empty());
        assert!(attach_stops(vec![], Some(StopValue::Percent(5.0)), None).is_empty());
        let rules = DiversificationRules { max_quantity: 1.0 };
        assert!(apply_diversification(vec![], &rules).is_empty());
        assert!(apply_risk_management(vec![], &RiskConfig::default()).is_empty());
    }

    #[test]
    fn full_pipeline_ordering() {
        let risk = RiskConfig {
            stop_loss: Some(StopValue::Percent(5.0)),
            take_profit: Some(StopValue::Percent(10.0)),
            leverage: 2.0,
            max_drawdown_limit: None,
            drawdown_policy: DrawdownPolicy::Advisory,
            diversification: Some(DiversificationRules { max_quantity: 15.0 }),
        };
        let out = apply_risk_management(vec![make_trade(50.0)], &risk);
        // Levered to qty 20, then capped to 15.
        assert!((out[0].quantity - 15.0).abs() < f64::EPSILON);
        assert_eq!(out[0].stop_loss_price, Some(95.0));
        assert_eq!(out[0].take_profit_price, Some(110.0));
    }
}

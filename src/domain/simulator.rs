//! Trade simulation: walks the bar sequence and emits realized trades.
//!
//! Two states per run: flat, or holding one open position. Entry rules are
//! evaluated while flat, exit rules while in a position, both in rule-list
//! order with the first full match winning. Exit orders are sized from the
//! open position, not the rule; a liquidity-capped exit realizes only the
//! filled quantity and keeps the remainder open. A position still open when
//! the bars run out is discarded rather than force-liquidated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::domain::bar::Bar;
use crate::domain::execution::{self, ExecutionConfig, ExecutionResult, Order, OrderSide};
use crate::domain::indicator::IndicatorSeries;
use crate::domain::rule::TradeRule;
use crate::domain::strategy::Strategy;

/// A realized round trip. Mutated by the risk pipeline, frozen once the
/// metrics calculator consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: OrderSide,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub exit_timestamp: DateTime<Utc>,
    pub quantity: f64,
    /// Round-trip commission (entry + exit orders).
    pub commission: f64,
    pub profit: f64,
    #[serde(default)]
    pub stop_loss_price: Option<f64>,
    #[serde(default)]
    pub take_profit_price: Option<f64>,
    pub partial_fill: bool,
}

impl Trade {
    /// Price PnL before commission.
    pub fn gross_profit(&self) -> f64 {
        self.profit + self.commission
    }
}

struct OpenPosition {
    side: OrderSide,
    entry_price: f64,
    entry_timestamp: DateTime<Utc>,
    quantity: f64,
    entry_commission: f64,
    partial_fill: bool,
}

enum State {
    Flat,
    InPosition(OpenPosition),
}

/// Walk the bars and return the realized trade list.
///
/// `indicators` must hold one series per strategy indicator, each aligned
/// with `bars`. Bars where a referenced indicator is still warming up can
/// trigger neither entries nor exits.
pub fn simulate_trades(
    bars: &[Bar],
    indicators: &HashMap<String, IndicatorSeries>,
    strategy: &Strategy,
    config: &ExecutionConfig,
) -> Vec<Trade> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let mut trades = Vec::new();
    let mut state = State::Flat;

    for (i, bar) in bars.iter().enumerate() {
        state = match state {
            State::Flat => {
                match try_rules(&strategy.entry_rules, &closes, indicators, i, bar, config, None) {
                    Some((rule, fill)) => {
                        debug!(
                            symbol = %strategy.asset_symbol,
                            bar = i,
                            price = fill.price,
                            "entry filled"
                        );
                        State::InPosition(OpenPosition {
                            side: rule.order.side,
                            entry_price: fill.price,
                            entry_timestamp: bar.timestamp,
                            quantity: fill.quantity,
                            entry_commission: fill.commission,
                            partial_fill: fill.partial_fill,
                        })
                    }
                    None => State::Flat,
                }
            }
            State::InPosition(mut open) => {
                let attempt = try_rules(
                    &strategy.exit_rules,
                    &closes,
                    indicators,
                    i,
                    bar,
                    config,
                    Some(open.quantity),
                );
                match attempt {
                    Some((_, fill)) => {
                        debug!(
                            symbol = %strategy.asset_symbol,
                            bar = i,
                            price = fill.price,
                            quantity = fill.quantity,
                            "exit filled"
                        );
                        if fill.partial_fill {
                            // Realize the filled slice; the rest of the
                            // position stays open for a later exit. Entry
                            // commission is split pro rata.
                            let entry_fee =
                                open.entry_commission * fill.quantity / open.quantity;
                            let slice = OpenPosition {
                                side: open.side,
                                entry_price: open.entry_price,
                                entry_timestamp: open.entry_timestamp,
                                quantity: fill.quantity,
                                entry_commission: entry_fee,
                                partial_fill: true,
                            };
                            trades.push(close_position(
                                slice,
                                bar.timestamp,
                                fill.price,
                                fill.commission,
                                true,
                            ));
                            open.quantity -= fill.quantity;
                            open.entry_commission -= entry_fee;
                            State::InPosition(open)
                        } else {
                            trades.push(close_position(
                                open,
                                bar.timestamp,
                                fill.price,
                                fill.commission,
                                fill.partial_fill,
                            ));
                            State::Flat
                        }
                    }
                    None => State::InPosition(open),
                }
            }
        };
    }

    // An open position at series end stays unrealized.
    trades
}

/// First rule whose comparisons all hold and whose order fills.
/// `quantity` overrides the rule's order size (used to exit exactly the
/// open position).
fn try_rules<'r>(
    rules: &'r [TradeRule],
    closes: &[f64],
    indicators: &HashMap<String, IndicatorSeries>,
    bar_index: usize,
    bar: &Bar,
    config: &ExecutionConfig,
    quantity: Option<f64>,
) -> Option<(&'r TradeRule, execution::Fill)> {
    for rule in rules {
        if !rule.matches(closes, indicators, bar_index) {
            continue;
        }
        let order = Order {
            side: rule.order.side,
            order_type: rule.order.order_type,
            quantity: quantity.unwrap_or(rule.order.quantity),
            price: rule.order.price,
        };
        match execution::execute(&order, bar.close, bar.volume, config) {
            ExecutionResult::Filled(fill) => return Some((rule, fill)),
            ExecutionResult::NotExecuted { reason } => {
                debug!(bar = bar_index, reason, "order not executed");
            }
        }
    }
    None
}

fn close_position(
    open: OpenPosition,
    exit_timestamp: DateTime<Utc>,
    exit_price: f64,
    exit_commission: f64,
    exit_partial: bool,
) -> Trade {
    let commission = open.entry_commission + exit_commission;
    let price_pnl = match open.side {
        OrderSide::Buy => (exit_price - open.entry_price) * open.quantity,
        OrderSide::Sell => (open.entry_price - exit_price) * open.quantity,
    };

    Trade {
        side: open.side,
        entry_price: open.entry_price,
        exit_price,
        entry_timestamp: open.entry_timestamp,
        exit_timestamp,
        quantity: open.quantity,
        commission,
        profit: price_pnl - commission,
        stop_loss_price: None,
        take_profit_price: None,
        partial_fill: open.partial_fill || exit_partial,
    }
}

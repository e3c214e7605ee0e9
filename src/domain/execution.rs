//! Order fill simulation: slippage, commission, and liquidity.
//!
//! Market orders always fill, with slippage against the trader. Limit and
//! stop orders fill at the current price only when their trigger condition
//! holds. Executed quantity is capped by the bar's available volume.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

/// Transient order, consumed immediately by [`execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
}

/// Fill parameters, tunable per asset class.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Percentage slippage applied to market fills.
    pub slippage_pct: f64,
    /// Fixed commission per executed order.
    pub commission: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            slippage_pct: 0.05,
            commission: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub price: f64,
    pub quantity: f64,
    pub commission: f64,
    pub partial_fill: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Filled(Fill),
    NotExecuted { reason: &'static str },
}

/// Simulate the fill of a single order at the current bar.
pub fn execute(
    order: &Order,
    current_price: f64,
    available_volume: f64,
    config: &ExecutionConfig,
) -> ExecutionResult {
    let price = match order.order_type {
        OrderType::Market => {
            let slippage = current_price * config.slippage_pct / 100.0;
            match order.side {
                OrderSide::Buy => current_price + slippage,
                OrderSide::Sell => current_price - slippage,
            }
        }
        OrderType::Limit => {
            let limit = order.price.unwrap_or(current_price);
            let met = match order.side {
                OrderSide::Buy => current_price <= limit,
                OrderSide::Sell => current_price >= limit,
            };
            if !met {
                return ExecutionResult::NotExecuted {
                    reason: "price not met",
                };
            }
            // No slippage on limit fills.
            current_price
        }
        OrderType::Stop => {
            let stop = order.price.unwrap_or(current_price);
            let reached = match order.side {
                OrderSide::Buy => current_price >= stop,
                OrderSide::Sell => current_price <= stop,
            };
            if !reached {
                return ExecutionResult::NotExecuted {
                    reason: "price not reached",
                };
            }
            current_price
        }
    };

    let quantity = order.quantity.min(available_volume);
    ExecutionResult::Filled(Fill {
        price,
        quantity,
        commission: config.commission,
        partial_fill: quantity < order.quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn market(side: OrderSide, quantity: f64) -> Order {
        Order {
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
        }
    }

    fn limit(side: OrderSide, quantity: f64, price: f64) -> Order {
        Order {
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
        }
    }

    fn stop(side: OrderSide, quantity: f64, price: f64) -> Order {
        Order {
            side,
            order_type: OrderType::Stop,
            quantity,
            price: Some(price),
        }
    }

    #[test]
    fn market_buy_slips_upward() {
        let cfg = ExecutionConfig::default();
        let result = execute(&market(OrderSide::Buy, 10.0), 100.0, 1000.0, &cfg);
        match result {
            ExecutionResult::Filled(fill) => {
                assert_relative_eq!(fill.price, 100.0 + 100.0 * 0.05 / 100.0);
                assert_relative_eq!(fill.commission, 1.0);
                assert!(!fill.partial_fill);
            }
            other => panic!("expected fill, got {other:?}"),
        }
    }

    #[test]
    fn market_sell_slips_downward() {
        let cfg = ExecutionConfig::default();
        let result = execute(&market(OrderSide::Sell, 10.0), 100.0, 1000.0, &cfg);
        match result {
            ExecutionResult::Filled(fill) => {
                assert_relative_eq!(fill.price, 100.0 - 100.0 * 0.05 / 100.0);
            }
            other => panic!("expected fill, got {other:?}"),
        }
    }

    #[test]
    fn limit_buy_above_market_price_rejected() {
        let cfg = ExecutionConfig::default();
        let result = execute(&limit(OrderSide::Buy, 10.0, 100.0), 105.0, 1000.0, &cfg);
        assert_eq!(
            result,
            ExecutionResult::NotExecuted {
                reason: "price not met"
            }
        );
    }

    #[test]
    fn limit_buy_fills_at_current_without_slippage() {
        let cfg = ExecutionConfig::default();
        let result = execute(&limit(OrderSide::Buy, 10.0, 100.0), 95.0, 1000.0, &cfg);
        match result {
            ExecutionResult::Filled(fill) => assert_relative_eq!(fill.price, 95.0),
            other => panic!("expected fill, got {other:?}"),
        }
    }

    #[test]
    fn limit_sell_requires_price_at_or_above() {
        let cfg = ExecutionConfig::default();
        let rejected = execute(&limit(OrderSide::Sell, 1.0, 100.0), 95.0, 1000.0, &cfg);
        assert!(matches!(rejected, ExecutionResult::NotExecuted { .. }));
        let filled = execute(&limit(OrderSide::Sell, 1.0, 100.0), 101.0, 1000.0, &cfg);
        assert!(matches!(filled, ExecutionResult::Filled(_)));
    }

    #[test]
    fn stop_buy_requires_price_at_or_above() {
        let cfg = ExecutionConfig::default();
        let rejected = execute(&stop(OrderSide::Buy, 1.0, 100.0), 95.0, 1000.0, &cfg);
        assert_eq!(
            rejected,
            ExecutionResult::NotExecuted {
                reason: "price not reached"
            }
        );
        let filled = execute(&stop(OrderSide::Buy, 1.0, 100.0), 101.0, 1000.0, &cfg);
        assert!(matches!(filled, ExecutionResult::Filled(_)));
    }

    #[test]
    fn stop_sell_requires_price_at_or_below() {
        let cfg = ExecutionConfig::default();
        let filled = execute(&stop(OrderSide::Sell, 1.0, 100.0), 99.0, 1000.0, &cfg);
        assert!(matches!(filled, ExecutionResult::Filled(_)));
        let rejected = execute(&stop(OrderSide::Sell, 1.0, 100.0), 101.0, 1000.0, &cfg);
        assert!(matches!(rejected, ExecutionResult::NotExecuted { .. }));
    }

    #[test]
    fn liquidity_caps_quantity() {
        let cfg = ExecutionConfig::default();
        let result = execute(&market(OrderSide::Buy, 500.0), 100.0, 120.0, &cfg);
        match result {
            ExecutionResult::Filled(fill) => {
                assert_relative_eq!(fill.quantity, 120.0);
                assert!(fill.partial_fill);
            }
            other => panic!("expected fill, got {other:?}"),
        }
    }

    #[test]
    fn slippage_is_configuration_not_constant() {
        let cfg = ExecutionConfig {
            slippage_pct: 1.0,
            commission: 2.5,
        };
        let result = execute(&market(OrderSide::Buy, 1.0), 200.0, 10.0, &cfg);
        match result {
            ExecutionResult::Filled(fill) => {
                assert_relative_eq!(fill.price, 202.0);
                assert_relative_eq!(fill.commission, 2.5);
            }
            other => panic!("expected fill, got {other:?}"),
        }
    }
}

//! Trading rule AST and evaluation.
//!
//! A rule is an ordered list of comparisons; it matches at a bar only when
//! every comparison holds. Comparisons referencing an indicator that is
//! still warming up cannot match.

use serde::{Deserialize, Serialize};

use crate::domain::execution::{OrderSide, OrderType};
use crate::domain::indicator::IndicatorSeries;
use std::collections::HashMap;

const EPSILON: f64 = 1e-9;

/// What a comparison side can refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Close,
    Constant(f64),
    /// Value of the named indicator at the current bar.
    Indicator(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    GreaterThan,
    LessThan,
    EqualTo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub left: Operand,
    pub op: CmpOp,
    pub right: Operand,
}

/// How the order opened or closed by a matching rule is shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    /// Required for limit and stop orders, ignored for market orders.
    #[serde(default)]
    pub price: Option<f64>,
}

/// One entry or exit rule: all comparisons must hold, then `order` fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRule {
    pub comparisons: Vec<Comparison>,
    pub order: OrderSpec,
}

impl TradeRule {
    /// Indicator names this rule references, for validation.
    pub fn referenced_indicators(&self) -> impl Iterator<Item = &str> {
        self.comparisons.iter().flat_map(|c| {
            [&c.left, &c.right].into_iter().filter_map(|op| match op {
                Operand::Indicator(name) => Some(name.as_str()),
                _ => None,
            })
        })
    }

    /// Evaluate the rule at `bar_index`. `false` when any referenced
    /// indicator value is undefined there (warm-up skip).
    pub fn matches(
        &self,
        closes: &[f64],
        indicators: &HashMap<String, IndicatorSeries>,
        bar_index: usize,
    ) -> bool {
        self.comparisons
            .iter()
            .all(|cmp| comparison_holds(cmp, closes, indicators, bar_index))
    }
}

fn comparison_holds(
    cmp: &Comparison,
    closes: &[f64],
    indicators: &HashMap<String, IndicatorSeries>,
    bar_index: usize,
) -> bool {
    let (left, right) = match (
        resolve(&cmp.left, closes, indicators, bar_index),
        resolve(&cmp.right, closes, indicators, bar_index),
    ) {
        (Some(l), Some(r)) => (l, r),
        _ => return false,
    };

    match cmp.op {
        CmpOp::GreaterThan => left > right,
        CmpOp::LessThan => left < right,
        CmpOp::EqualTo => (left - right).abs() < EPSILON,
    }
}

fn resolve(
    operand: &Operand,
    closes: &[f64],
    indicators: &HashMap<String, IndicatorSeries>,
    bar_index: usize,
) -> Option<f64> {
    match operand {
        Operand::Close => closes.get(bar_index).copied(),
        Operand::Constant(v) => Some(*v),
        Operand::Indicator(name) => indicators.get(name)?.value_at(bar_index),
    }
}

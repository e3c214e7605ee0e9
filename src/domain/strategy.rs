//! Strategy definition: indicators, entry/exit rules, risk configuration.
//!
//! A [`Strategy`] is immutable for the duration of one backtest; the
//! optimizer clones and mutates only its own copy per candidate. Use
//! [`StrategyBuilder`] to construct a validated value.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::QuantbackError;
use crate::domain::execution::OrderType;
use crate::domain::indicator::IndicatorSpec;
use crate::domain::rule::TradeRule;

/// Percentage-or-fixed value, as in `"5%"` or `50`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StopValueRepr", into = "StopValueRepr")]
pub enum StopValue {
    /// Percent of entry price.
    Percent(f64),
    /// Absolute price offset.
    Fixed(f64),
}

impl StopValue {
    /// Price offset this value represents for a given entry price.
    pub fn offset_from(&self, entry_price: f64) -> f64 {
        match self {
            StopValue::Percent(pct) => entry_price * pct / 100.0,
            StopValue::Fixed(v) => *v,
        }
    }
}

impl FromStr for StopValue {
    type Err = QuantbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (body, is_pct) = match trimmed.strip_suffix('%') {
            Some(body) => (body, true),
            None => (trimmed, false),
        };
        let value: f64 = body.trim().parse().map_err(|_| QuantbackError::Validation {
            reason: format!("invalid stop value {trimmed:?}"),
        })?;
        Ok(if is_pct {
            StopValue::Percent(value)
        } else {
            StopValue::Fixed(value)
        })
    }
}

/// Serde wire form: a bare number is a fixed offset, a string may carry `%`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StopValueRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<StopValueRepr> for StopValue {
    type Error = QuantbackError;

    fn try_from(repr: StopValueRepr) -> Result<Self, Self::Error> {
        match repr {
            StopValueRepr::Number(v) => Ok(StopValue::Fixed(v)),
            StopValueRepr::Text(s) => s.parse(),
        }
    }
}

impl From<StopValue> for StopValueRepr {
    fn from(value: StopValue) -> Self {
        match value {
            StopValue::Fixed(v) => StopValueRepr::Number(v),
            StopValue::Percent(pct) => StopValueRepr::Text(format!("{pct}%")),
        }
    }
}

/// What to do once the running drawdown exceeds the configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawdownPolicy {
    /// Log the breach and pass trades through unchanged.
    #[default]
    Advisory,
    /// Drop every trade after the one that breached the limit.
    Truncate,
}

/// Sizing caps applied across the trade list when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversificationRules {
    /// Largest quantity any single trade may carry.
    pub max_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default)]
    pub stop_loss: Option<StopValue>,
    #[serde(default)]
    pub take_profit: Option<StopValue>,
    pub leverage: f64,
    /// Drawdown the gate tolerates before acting; `None` means unlimited.
    #[serde(default)]
    pub max_drawdown_limit: Option<f64>,
    #[serde(default)]
    pub drawdown_policy: DrawdownPolicy,
    #[serde(default)]
    pub diversification: Option<DiversificationRules>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            stop_loss: None,
            take_profit: None,
            leverage: 1.0,
            max_drawdown_limit: None,
            drawdown_policy: DrawdownPolicy::Advisory,
            diversification: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    pub asset_symbol: String,
    pub time_frame: String,
    pub indicators: Vec<IndicatorSpec>,
    pub entry_rules: Vec<TradeRule>,
    pub exit_rules: Vec<TradeRule>,
    #[serde(default)]
    pub risk: RiskConfig,
}

impl Strategy {
    /// Re-run builder validation, for strategies deserialized from files.
    pub fn validate(&self) -> Result<(), QuantbackError> {
        validate_strategy(self)
    }
}

/// Incremental, validating constructor for [`Strategy`].
#[derive(Debug, Clone)]
pub struct StrategyBuilder {
    name: String,
    asset_symbol: String,
    time_frame: String,
    indicators: Vec<IndicatorSpec>,
    entry_rules: Vec<TradeRule>,
    exit_rules: Vec<TradeRule>,
    risk: RiskConfig,
}

impl StrategyBuilder {
    pub fn new(name: &str, asset_symbol: &str, time_frame: &str) -> Self {
        StrategyBuilder {
            name: name.to_string(),
            asset_symbol: asset_symbol.to_string(),
            time_frame: time_frame.to_string(),
            indicators: Vec::new(),
            entry_rules: Vec::new(),
            exit_rules: Vec::new(),
            risk: RiskConfig::default(),
        }
    }

    pub fn indicator(mut self, spec: IndicatorSpec) -> Self {
        self.indicators.push(spec);
        self
    }

    pub fn entry_rule(mut self, rule: TradeRule) -> Self {
        self.entry_rules.push(rule);
        self
    }

    pub fn exit_rule(mut self, rule: TradeRule) -> Self {
        self.exit_rules.push(rule);
        self
    }

    pub fn risk(mut self, risk: RiskConfig) -> Self {
        self.risk = risk;
        self
    }

    /// Finalize into a validated, immutable [`Strategy`].
    pub fn build(self) -> Result<Strategy, QuantbackError> {
        let strategy = Strategy {
            name: self.name,
            asset_symbol: self.asset_symbol,
            time_frame: self.time_frame,
            indicators: self.indicators,
            entry_rules: self.entry_rules,
            exit_rules: self.exit_rules,
            risk: self.risk,
        };
        validate_strategy(&strategy)?;
        Ok(strategy)
    }
}

fn validate_strategy(strategy: &Strategy) -> Result<(), QuantbackError> {
    if strategy.indicators.is_empty() {
        return Err(QuantbackError::Validation {
            reason: format!("strategy {} has no indicators", strategy.name),
        });
    }

    for rule in strategy.entry_rules.iter().chain(&strategy.exit_rules) {
        for name in rule.referenced_indicators() {
            if !strategy.indicators.iter().any(|spec| spec.name == name) {
                return Err(QuantbackError::Validation {
                    reason: format!(
                        "rule in strategy {} references unknown indicator {name}",
                        strategy.name
                    ),
                });
            }
        }
        let order = &rule.order;
        if matches!(order.order_type, OrderType::Limit | OrderType::Stop) && order.price.is_none()
        {
            return Err(QuantbackError::Validation {
                reason: format!(
                    "{:?} order in strategy {} requires a price",
                    order.order_type, strategy.name
                ),
            });
        }
        if order.quantity <= 0.0 {
            return Err(QuantbackError::Validation {
                reason: format!("order quantity in strategy {} must be positive", strategy.name),
            });
        }
    }

    Ok(())
}

//! Technical indicator engine.
//!
//! Supported names form a fixed registry: `SMA`, `EMA`, `RSI`, `MACD`.
//! Every indicator produces a series the same length as its input, with
//! leading `None` entries until enough samples exist for its window.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::QuantbackError;

/// A named indicator plus its parameter map, as it appears in a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

impl IndicatorSpec {
    pub fn new(name: &str, parameters: &[(&str, f64)]) -> Self {
        IndicatorSpec {
            name: name.to_string(),
            parameters: parameters
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }
}

/// Indicator values aligned 1:1 with the bar sequence; `None` during warm-up.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

/// Compute an indicator series from close prices.
///
/// Dispatches on the upper-cased name; unregistered names are a
/// configuration error, not a transient failure.
pub fn compute(spec: &IndicatorSpec, closes: &[f64]) -> Result<IndicatorSeries, QuantbackError> {
    let values = match spec.name.to_uppercase().as_str() {
        "SMA" => sma::sma(closes, period_param(spec, "period")?),
        "EMA" => ema::ema(closes, period_param(spec, "period")?),
        "RSI" => rsi::rsi(closes, period_param(spec, "period")?),
        "MACD" => {
            let fast = period_param_or(spec, "fast_period", macd::DEFAULT_FAST)?;
            let slow = period_param_or(spec, "slow_period", macd::DEFAULT_SLOW)?;
            let signal = period_param_or(spec, "signal_period", macd::DEFAULT_SIGNAL)?;
            macd::macd_line(closes, fast, slow, signal)
        }
        _ => {
            return Err(QuantbackError::UnsupportedIndicator {
                name: spec.name.clone(),
            })
        }
    };

    Ok(IndicatorSeries {
        name: spec.name.clone(),
        values,
    })
}

fn period_param(spec: &IndicatorSpec, key: &str) -> Result<usize, QuantbackError> {
    let raw = spec
        .parameters
        .get(key)
        .copied()
        .ok_or_else(|| QuantbackError::Computation {
            indicator: spec.name.clone(),
            reason: format!("missing parameter {key}"),
        })?;
    usize_param(spec, key, raw)
}

fn period_param_or(
    spec: &IndicatorSpec,
    key: &str,
    default: usize,
) -> Result<usize, QuantbackError> {
    match spec.parameters.get(key) {
        Some(&raw) => usize_param(spec, key, raw),
        None => Ok(default),
    }
}

fn usize_param(spec: &IndicatorSpec, key: &str, raw: f64) -> Result<usize, QuantbackError> {
    if !raw.is_finite() || raw < 1.0 || raw.fract() != 0.0 {
        return Err(QuantbackError::Computation {
            indicator: spec.name.clone(),
            reason: format!("parameter {key} must be a positive integer, got {raw}"),
        });
    }
    Ok(raw as usize)
}

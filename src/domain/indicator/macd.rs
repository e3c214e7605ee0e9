//! Moving Average Convergence Divergence.
//!
//! MACD line = EMA(fast) - EMA(slow), undefined until the slow EMA exists.
//! The rule language consumes the line only; the signal period is accepted
//! in the parameter map but does not shift the series.

use super::ema::ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn macd_line(closes: &[f64], fast: usize, slow: usize, _signal: usize) -> Vec<Option<f64>> {
    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);

    ema_fast
        .into_iter()
        .zip(ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect()
}

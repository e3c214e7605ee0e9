//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warm-up: first (n-1) entries are `None`.

pub fn ema(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = Vec::with_capacity(closes.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = 0.0;
    let mut sum = 0.0;

    for (i, &close) in closes.iter().enumerate() {
        if i + 1 < period {
            sum += close;
            values.push(None);
        } else if i + 1 == period {
            sum += close;
            prev = sum / period as f64;
            values.push(Some(prev));
        } else {
            prev = close * k + prev * (1.0 - k);
            values.push(Some(prev));
        }
    }

    values
}

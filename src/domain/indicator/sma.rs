//! Simple Moving Average.
//!
//! SMA[i] = mean(C[i-n+1] ..= C[i]). Warm-up: first (n-1) entries are `None`.

/// Rolling-sum implementation; O(len) regardless of period.
pub fn sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = Vec::with_capacity(closes.len());
    let mut sum = 0.0;

    for (i, &close) in closes.iter().enumerate() {
        sum += close;
        if i >= period {
            sum -= closes[i - period];
        }
        if i + 1 >= period {
            values.push(Some(sum / period as f64));
        } else {
            values.push(None);
        }
    }

    values
}

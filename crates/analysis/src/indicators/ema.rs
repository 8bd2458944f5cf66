/// Exponential moving average seeded with the SMA of the first `period`
/// values. Entries before index `period - 1` are `None`.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);
    for (i, &v) in values.iter().enumerate().skip(period) {
        current = v * k + current * (1.0 - k);
        out[i] = Some(current);
    }
    out
}

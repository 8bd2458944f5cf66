use common::CandleSeries;

/// Rolling z-score of volume over `window` bars ending at each candle.
///
/// Uses the population standard deviation. A window with zero dispersion
/// scores 0. The first `window - 1` entries are `None`.
pub fn volume_zscore(series: &CandleSeries, window: usize) -> Vec<Option<f64>> {
    zscore(&series.volumes(), window)
}

fn zscore(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    for end in window - 1..values.len() {
        let slice = &values[end + 1 - window..=end];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let variance = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window as f64;
        let std = variance.sqrt();
        out[end] = Some(if std > 0.0 {
            (values[end] - mean) / std
        } else {
            0.0
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_entries_undefined() {
        let z = zscore(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(z[0], None);
        assert_eq!(z[1], None);
        assert!(z[2].is_some());
    }

    #[test]
    fn constant_volume_scores_zero() {
        let z = zscore(&[5.0; 6], 4);
        assert_eq!(z[5], Some(0.0));
    }

    #[test]
    fn spike_scores_high() {
        let mut v = vec![10.0; 19];
        v.push(100.0);
        let z = zscore(&v, 20)[19].unwrap();
        assert!(z > 3.0, "z = {z}");
    }

    #[test]
    fn short_input_is_all_none() {
        assert!(zscore(&[1.0, 2.0], 5).iter().all(Option::is_none));
    }
}

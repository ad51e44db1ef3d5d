/// Simple Moving Average (SMA)
/// Returns a vector aligned with `values`:
/// - `None` until enough values exist
/// - `Some(avg)` after `window` values
pub fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    // Running sum via scan, subtracting the value that falls out of the window.
    values
        .iter()
        .enumerate()
        .scan(0.0_f64, move |sum, (i, &v)| {
            *sum += v;
            if i >= window {
                *sum -= values[i - window];
            }

            let out = if i + 1 >= window {
                Some(*sum / window as f64)
            } else {
                None
            };

            Some(out)
        })
        .collect()
}

/// Percent change over `period` steps: (v[i] / v[i-period] - 1) * 100.
pub fn pct_change(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    for i in period..values.len() {
        let prev = values[i - period];
        if prev != 0.0 {
            out[i] = Some((values[i] / prev - 1.0) * 100.0);
        }
    }
    out
}

/// Series shifted forward by `period` steps (the value `period` days ago).
pub fn lag(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for i in period..values.len() {
        out[i] = Some(values[i - period]);
    }
    out
}

/// SMA over an already-gapped series: `Some` only when the full window of
/// inputs is `Some`.
pub fn sma_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    let mut out = vec![None; values.len()];
    for i in 0..values.len() {
        if i + 1 >= window {
            let slice = &values[i + 1 - window..=i];
            if slice.iter().all(|v| v.is_some()) {
                let sum: f64 = slice.iter().map(|v| v.unwrap()).sum();
                out[i] = Some(sum / window as f64);
            }
        }
    }
    out
}

/// Relative Strength Index (RSI), Cutler's variant: simple rolling averages
/// of gains and losses rather than exponential smoothing. Matches the
/// training pipeline that produced the historical datasets.
///
/// Returns `None` for the first `period` values.
pub fn rsi(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    if prices.len() < 2 || period == 0 {
        return vec![None; prices.len()];
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = changes.iter().map(|&c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|&c| (-c).max(0.0)).collect();

    let avg_gains = sma(&gains, period);
    let avg_losses = sma(&losses, period);

    let mut out = vec![None; prices.len()];
    for i in 0..changes.len() {
        if let (Some(gain), Some(loss)) = (avg_gains[i], avg_losses[i]) {
            let rsi_value = if loss == 0.0 {
                100.0
            } else {
                let rs = gain / loss;
                100.0 - (100.0 / (1.0 + rs))
            };
            out[i + 1] = Some(rsi_value);
        }
    }
    out
}

/// Bollinger Bands: SMA middle band with +/- `num_std_dev` population
/// standard deviations.
///
/// Returns: (middle_band, upper_band, lower_band)
pub fn bollinger_bands(
    prices: &[f64],
    period: usize,
    num_std_dev: f64,
) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    if prices.is_empty() || period == 0 {
        return (Vec::new(), Vec::new(), Vec::new());
    }

    let len = prices.len();
    let middle_band = sma(prices, period);

    let mut upper_band: Vec<Option<f64>> = vec![None; len];
    let mut lower_band: Vec<Option<f64>> = vec![None; len];

    for i in 0..len {
        if i + 1 >= period {
            let window = &prices[i + 1 - period..=i];
            let mean = middle_band[i].unwrap_or(0.0);

            let variance =
                window.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / period as f64;
            let std_dev = variance.sqrt();

            upper_band[i] = Some(mean + num_std_dev * std_dev);
            lower_band[i] = Some(mean - num_std_dev * std_dev);
        }
    }

    (middle_band, upper_band, lower_band)
}

/// Volume trend: (volume SMA, volume / volume SMA).
pub fn volume_trend(volumes: &[f64], period: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    if volumes.is_empty() || period == 0 {
        return (Vec::new(), Vec::new());
    }

    let len = volumes.len();
    let volume_sma = sma(volumes, period);
    let mut volume_ratio: Vec<Option<f64>> = vec![None; len];

    for i in 0..len {
        if let Some(avg) = volume_sma[i] {
            if avg > 0.0 {
                volume_ratio[i] = Some(volumes[i] / avg);
            }
        }
    }

    (volume_sma, volume_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_window_alignment() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&values, 3);

        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_eq!(result[2], Some(2.0));
        assert_eq!(result[4], Some(4.0));
    }

    #[test]
    fn test_pct_change_basic() {
        let values = vec![100.0, 110.0, 99.0];
        let result = pct_change(&values, 1);

        assert_eq!(result[0], None);
        assert!((result[1].unwrap() - 10.0).abs() < 1e-9);
        assert!((result[2].unwrap() - -10.0).abs() < 1e-9);
    }

    #[test]
    fn test_lag_shifts_values() {
        let values = vec![1.0, 2.0, 3.0];
        let result = lag(&values, 2);
        assert_eq!(result, vec![None, None, Some(1.0)]);
    }

    #[test]
    fn test_rsi_range_and_extremes() {
        let uptrend: Vec<f64> = (0..30).map(|i| 50.0 + i as f64).collect();
        let values = rsi(&uptrend, 14);

        for v in values.iter().flatten() {
            assert!((0.0..=100.0).contains(v));
        }
        // Monotone uptrend has zero losses
        assert_eq!(values.last().and_then(|&v| v), Some(100.0));

        let downtrend: Vec<f64> = (0..30).map(|i| 80.0 - i as f64).collect();
        let values = rsi(&downtrend, 14);
        assert!(values.last().and_then(|&v| v).unwrap() < 30.0);
    }

    #[test]
    fn test_bollinger_bands_flat_prices() {
        let prices: Vec<f64> = vec![100.0; 30];
        let (middle, upper, lower) = bollinger_bands(&prices, 20, 2.0);

        if let (Some(mid), Some(up), Some(low)) = (middle[25], upper[25], lower[25]) {
            assert!((mid - 100.0).abs() < 0.01);
            assert!(up >= mid);
            assert!(low <= mid);
        } else {
            panic!("bands missing after window");
        }
    }

    #[test]
    fn test_volume_trend_spike_ratio() {
        let volumes = vec![1000.0, 1000.0, 1000.0, 1000.0, 1000.0, 3000.0];
        let (_, ratio) = volume_trend(&volumes, 5);
        assert!(ratio[5].unwrap() > 1.5);
    }

    #[test]
    fn test_sma_opt_requires_full_window() {
        let values = vec![None, Some(2.0), Some(4.0), Some(6.0)];
        let result = sma_opt(&values, 2);
        assert_eq!(result[1], None); // window includes the leading gap
        assert_eq!(result[2], Some(3.0));
        assert_eq!(result[3], Some(5.0));
    }
}

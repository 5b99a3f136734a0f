use crate::models::Bar;

/// Exponential Moving Average of close prices, one value per bar
///
/// Seeded with the first close, then smoothed with alpha = 2 / (period + 1).
/// Short series are not rejected; early values just carry less history.
pub fn calculate_ema(bars: &[Bar], period: usize) -> Vec<f64> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    ema_series(&closes, period)
}

/// EMA over a raw value series
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period.max(1) as f64 + 1.0);
    exponential_smooth(values, alpha)
}

/// First-value-seeded exponential smoothing shared by EMA and ATR
pub(crate) fn exponential_smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut iter = values.iter();

    let Some(&first) = iter.next() else {
        return out;
    };
    out.push(first);

    let mut prev = first;
    for &value in iter {
        prev += alpha * (value - prev);
        out.push(prev);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_seeded_with_first_value() {
        let ema = ema_series(&[100.0], 9);
        assert_eq!(ema, vec![100.0]);
    }

    #[test]
    fn test_ema_recurrence() {
        // period 3 -> alpha 0.5
        let ema = ema_series(&[10.0, 20.0, 30.0], 3);
        assert_eq!(ema, vec![10.0, 15.0, 22.5]);
    }

    #[test]
    fn test_ema_empty() {
        assert!(ema_series(&[], 5).is_empty());
    }

    #[test]
    fn test_ema_period_one_tracks_price() {
        let prices = vec![100.0, 102.0, 98.0];
        assert_eq!(ema_series(&prices, 1), prices);
    }

    #[test]
    fn test_ema_lags_uptrend() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let ema = ema_series(&prices, 5);
        assert!(ema[19] < prices[19]);
        assert!(ema[19] > prices[10]);
    }
}

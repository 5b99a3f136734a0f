//! Average True Range (ATR) indicator
//!
//! Measures market volatility by smoothing the true range of each bar.
//! True Range is the greatest of:
//! - Current High - Current Low
//! - Abs(Current High - Previous Close)
//! - Abs(Current Low - Previous Close)
//!
//! Uses Wilder's smoothing (alpha = 1 / period) seeded with the first true range.

use super::moving_average::exponential_smooth;
use crate::models::Bar;

/// True range for every bar
///
/// The first bar has no previous close, so its true range is high - low.
pub fn calculate_true_range(bars: &[Bar]) -> Vec<f64> {
    let mut true_ranges = Vec::with_capacity(bars.len());

    if let Some(first) = bars.first() {
        true_ranges.push(first.high - first.low);
    }

    for window in bars.windows(2) {
        let prev_close = window[0].close;
        let high = window[1].high;
        let low = window[1].low;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        true_ranges.push(tr);
    }

    true_ranges
}

/// ATR series aligned with bars
///
/// Values before index `period - 1` have a short window behind them but are
/// returned anyway; the signal engine applies its own length gate.
pub fn calculate_atr(bars: &[Bar], period: usize) -> Vec<f64> {
    let true_ranges = calculate_true_range(bars);
    exponential_smooth(&true_ranges, 1.0 / period.max(1) as f64)
}

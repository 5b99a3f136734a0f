//! Supertrend: ATR bands around the bar midpoint that ratchet toward price
//! and flip direction when a close crosses the active band.
//!
//! The recurrence is sequential. Each final band depends on the previous
//! bar's ratcheted band, not on its raw candidate, so the whole series is
//! computed in one left-to-right pass.

use super::atr::calculate_atr;
use crate::models::{Bar, TrendDirection};

/// Supertrend output, every vector aligned with the input bars
#[derive(Debug, Clone, PartialEq)]
pub struct SupertrendSeries {
    /// Trend state per bar, seeded `Up` at index 0
    pub direction: Vec<TrendDirection>,
    /// Active band: lower band in an uptrend, upper band in a downtrend
    pub band: Vec<f64>,
    /// Ratcheted upper band, `None` while it is not the active band
    pub upper: Vec<Option<f64>>,
    /// Ratcheted lower band, `None` while it is not the active band
    pub lower: Vec<Option<f64>>,
    /// ATR used for the band width, exposed for reuse by callers
    pub atr: Vec<f64>,
}

impl SupertrendSeries {
    pub fn len(&self) -> usize {
        self.direction.len()
    }

    pub fn is_empty(&self) -> bool {
        self.direction.is_empty()
    }

    /// True when the direction at `index` differs from the bar before it
    pub fn flipped_at(&self, index: usize) -> bool {
        index > 0
            && index < self.direction.len()
            && self.direction[index] != self.direction[index - 1]
    }
}

/// Compute Supertrend over `bars`
///
/// `multiplier` scales the ATR into the band half-width.
pub fn calculate_supertrend(bars: &[Bar], atr_period: usize, multiplier: f64) -> SupertrendSeries {
    let n = bars.len();
    let atr = calculate_atr(bars, atr_period);

    let mut direction = Vec::with_capacity(n);
    let mut band = Vec::with_capacity(n);
    let mut upper = Vec::with_capacity(n);
    let mut lower = Vec::with_capacity(n);

    let mut trend = TrendDirection::Up;
    let mut final_upper = f64::NAN;
    let mut final_lower = f64::NAN;

    for (i, bar) in bars.iter().enumerate() {
        let width = multiplier * atr[i];
        let candidate_upper = bar.mid() + width;
        let candidate_lower = bar.mid() - width;

        if i == 0 {
            final_upper = candidate_upper;
            final_lower = candidate_lower;
        } else {
            let prev_close = bars[i - 1].close;

            // Lower band only tightens upward while price holds above it
            final_lower = if prev_close > final_lower {
                candidate_lower.max(final_lower)
            } else {
                candidate_lower
            };

            // Upper band only tightens downward while price holds below it
            final_upper = if prev_close < final_upper {
                candidate_upper.min(final_upper)
            } else {
                candidate_upper
            };

            trend = match trend {
                TrendDirection::Up if bar.close < final_lower => TrendDirection::Down,
                TrendDirection::Down if bar.close > final_upper => TrendDirection::Up,
                unchanged => unchanged,
            };
        }

        direction.push(trend);
        match trend {
            TrendDirection::Up => {
                band.push(final_lower);
                lower.push(Some(final_lower));
                upper.push(None);
            }
            TrendDirection::Down => {
                band.push(final_upper);
                upper.push(Some(final_upper));
                lower.push(None);
            }
        }
    }

    SupertrendSeries {
        direction,
        band,
        upper,
        lower,
        atr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 45, 0).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                timestamp: start + Duration::minutes(15 * i as i64),
                open,
                high,
                low,
                close,
                volume: None,
            })
            .collect()
    }

    #[test]
    fn test_first_bar_seeded_up() {
        let bars = make_ohlc_bars(&[(100.0, 105.0, 95.0, 102.0)]);
        let st = calculate_supertrend(&bars, 10, 3.0);

        assert_eq!(st.direction, vec![TrendDirection::Up]);
        // mid 100, atr 10, width 30
        assert_eq!(st.band, vec![70.0]);
        assert_eq!(st.lower, vec![Some(70.0)]);
        assert_eq!(st.upper, vec![None]);
        assert!(!st.flipped_at(0));
    }

    #[test]
    fn test_empty_series() {
        let st = calculate_supertrend(&[], 10, 3.0);
        assert!(st.is_empty());
    }

    #[test]
    fn test_uptrend_band_below_price() {
        let data: Vec<_> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                (base - 1.0, base + 3.0, base - 3.0, base + 1.0)
            })
            .collect();
        let bars = make_ohlc_bars(&data);
        let st = calculate_supertrend(&bars, 3, 2.0);

        for i in 0..bars.len() {
            assert_eq!(st.direction[i], TrendDirection::Up);
            assert!(st.band[i] < bars[i].close, "band above close at {i}");
        }
    }

    #[test]
    fn test_downtrend_flips_and_band_above_price() {
        let data: Vec<_> = (0..20)
            .map(|i| {
                let base = 200.0 - i as f64 * 3.0;
                (base + 1.0, base + 3.0, base - 3.0, base - 1.0)
            })
            .collect();
        let bars = make_ohlc_bars(&data);
        let st = calculate_supertrend(&bars, 3, 2.0);

        let flip = (1..bars.len())
            .find(|&i| st.flipped_at(i))
            .expect("downtrend should flip the seeded uptrend");
        for i in flip..bars.len() {
            assert_eq!(st.direction[i], TrendDirection::Down);
            assert!(st.band[i] > bars[i].close);
            assert_eq!(st.upper[i], Some(st.band[i]));
            assert_eq!(st.lower[i], None);
        }
    }

    #[test]
    fn test_lower_band_ratchets_instead_of_relaxing() {
        // Calm bars then a wide-range bar that stays above the band: the raw
        // candidate drops, the active band must not.
        let bars = make_ohlc_bars(&[
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 110.0, 90.0, 100.0),
        ]);
        let st = calculate_supertrend(&bars, 2, 1.0);

        // bar 0: atr 2, lower 98 ; bar 1: atr 2, lower 98
        // bar 2: atr (2 + 20) / 2 = 11, candidate 89 -> stays 98
        assert_eq!(st.band, vec![98.0, 98.0, 98.0]);
        assert_eq!(st.atr, vec![2.0, 2.0, 11.0]);
    }

    #[test]
    fn test_flat_series_never_flips() {
        let bars = make_ohlc_bars(&[(100.0, 100.0, 100.0, 100.0); 30]);
        let st = calculate_supertrend(&bars, 10, 3.0);

        assert!(st.direction.iter().all(|d| d.is_up()));
        assert!(st.band.iter().all(|&b| b == 100.0));
    }
}

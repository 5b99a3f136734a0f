use super::{
    signals::{atr_exit_levels, band_exit_levels, ExitPolicy, SignalConfig, SignalMode},
    Strategy,
};
use crate::indicators::{calculate_atr, calculate_ema, calculate_supertrend};
use crate::models::{Bar, Decision, Signal, TrendDirection};

/// EMA filter + Supertrend confirmation with ATR or band exits
///
/// A long fires when Supertrend points up and the close is above the EMA, a
/// short when it points down and the close is below. In flip-confirmed mode
/// the Supertrend must have changed direction on the decision bar itself.
#[derive(Debug, Clone, Default)]
pub struct SupertrendEmaStrategy {
    config: SignalConfig,
}

impl SupertrendEmaStrategy {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }
}

impl Strategy for SupertrendEmaStrategy {
    fn generate_signal(&self, bars: &[Bar]) -> Signal {
        generate_signal(bars, &self.config)
    }

    fn name(&self) -> &str {
        "SupertrendEma"
    }

    fn min_bars_required(&self) -> usize {
        self.config.min_bars_required()
    }
}

/// Evaluate the last bar of `bars` under `config`
///
/// Returns a `NONE` signal with nothing populated when the series is shorter
/// than [`SignalConfig::min_bars_required`]. Bars must already be sorted by
/// time.
pub fn generate_signal(bars: &[Bar], config: &SignalConfig) -> Signal {
    if bars.len() < config.min_bars_required().max(2) {
        return Signal::none();
    }

    debug_assert!(
        bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp),
        "bars must be strictly increasing in time"
    );

    let i = bars.len() - 1;
    let current = &bars[i];

    let ema = calculate_ema(bars, config.ema_period);
    let supertrend = calculate_supertrend(
        bars,
        config.supertrend_atr_period,
        config.supertrend_multiplier,
    );

    let exit_atr = match config.exit_atr_period() {
        Some(period) if period != config.supertrend_atr_period => {
            calculate_atr(bars, period).get(i).copied()
        }
        _ => supertrend.atr.get(i).copied(),
    };

    let mut signal = Signal {
        timestamp: Some(current.timestamp),
        ema: finite(ema[i]),
        atr: exit_atr.and_then(finite),
        supertrend: finite(supertrend.band[i]),
        direction: Some(supertrend.direction[i]),
        ..Signal::none()
    };

    // Any undefined value at the decision bar means no decision
    let (Some(entry), Some(ema_now), Some(band), Some(atr_now)) =
        (finite(current.close), signal.ema, signal.supertrend, signal.atr)
    else {
        tracing::debug!(timestamp = %current.timestamp, "Non-finite indicator value, no decision");
        return signal;
    };

    let decision = decide(
        config.signal_mode,
        supertrend.direction[i - 1],
        supertrend.direction[i],
        entry,
        ema_now,
    );

    let levels = match &config.exit {
        ExitPolicy::AtrMultiple {
            sl_multiplier,
            tp_multiplier,
            ..
        } => atr_exit_levels(decision, entry, atr_now, *sl_multiplier, *tp_multiplier),
        ExitPolicy::SupertrendBand => band_exit_levels(decision, band),
    };

    tracing::debug!(
        close = entry,
        ema = ema_now,
        supertrend = band,
        atr = atr_now,
        direction = %supertrend.direction[i],
        decision = %decision,
        "Evaluated decision bar"
    );

    if let Some(levels) = levels {
        signal.decision = decision;
        signal.entry_price = Some(entry);
        signal.stop_loss = finite(levels.stop_loss);
        signal.take_profit = levels.take_profit.and_then(finite);
        signal.risk_reward = levels.risk_reward.and_then(finite);
    }

    signal
}

/// Entry rule applied to the previous and current Supertrend direction
fn decide(
    mode: SignalMode,
    previous: TrendDirection,
    current: TrendDirection,
    close: f64,
    ema: f64,
) -> Decision {
    if mode == SignalMode::FlipConfirmed && previous == current {
        return Decision::NoSignal;
    }

    match current {
        TrendDirection::Up if close > ema => Decision::Buy,
        TrendDirection::Down if close < ema => Decision::Sell,
        _ => Decision::NoSignal,
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn create_test_bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 3, 45, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + Duration::minutes(15 * i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: Some(1000.0),
            })
            .collect()
    }

    #[test]
    fn test_decide_flip_confirmed() {
        use TrendDirection::{Down, Up};
        let mode = SignalMode::FlipConfirmed;

        assert_eq!(decide(mode, Down, Up, 105.0, 100.0), Decision::Buy);
        assert_eq!(decide(mode, Up, Up, 105.0, 100.0), Decision::NoSignal);
        assert_eq!(decide(mode, Up, Down, 95.0, 100.0), Decision::Sell);
        // Flip against the EMA filter
        assert_eq!(decide(mode, Down, Up, 95.0, 100.0), Decision::NoSignal);
    }

    #[test]
    fn test_decide_state_filter() {
        use TrendDirection::{Down, Up};
        let mode = SignalMode::StateFilter;

        assert_eq!(decide(mode, Up, Up, 105.0, 100.0), Decision::Buy);
        assert_eq!(decide(mode, Down, Down, 95.0, 100.0), Decision::Sell);
        assert_eq!(decide(mode, Down, Down, 105.0, 100.0), Decision::NoSignal);
        assert_eq!(decide(mode, Up, Up, 100.0, 100.0), Decision::NoSignal);
    }

    #[test]
    fn test_insufficient_data_returns_empty_none() {
        let config = SignalConfig {
            ema_period: 30,
            ..SignalConfig::default()
        };
        let bars = create_test_bars(&[100.0, 101.0, 102.0, 103.0, 104.0]);

        let signal = generate_signal(&bars, &config);
        assert_eq!(signal, Signal::none());
    }

    #[test]
    fn test_empty_series() {
        let signal = generate_signal(&[], &SignalConfig::default());
        assert_eq!(signal.decision, Decision::NoSignal);
    }

    #[test]
    fn test_raw_values_populated_without_signal() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let bars = create_test_bars(&closes);

        let signal = generate_signal(&bars, &SignalConfig::default());

        // Steady uptrend: no flip on the last bar
        assert_eq!(signal.decision, Decision::NoSignal);
        assert_eq!(signal.timestamp, Some(bars[59].timestamp));
        assert_eq!(signal.direction, Some(TrendDirection::Up));
        assert!(signal.ema.is_some());
        assert!(signal.atr.is_some());
        assert!(signal.supertrend.is_some());
        assert_eq!(signal.entry_price, None);
        assert_eq!(signal.stop_loss, None);
    }

    #[test]
    fn test_state_filter_fires_in_steady_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let bars = create_test_bars(&closes);
        let strategy = SupertrendEmaStrategy::new(SignalConfig {
            signal_mode: SignalMode::StateFilter,
            ..SignalConfig::default()
        });

        let signal = strategy.generate_signal(&bars);
        assert_eq!(signal.decision, Decision::Buy);
        assert_eq!(signal.entry_price, Some(159.0));

        let atr = signal.atr.unwrap();
        assert!((signal.stop_loss.unwrap() - (159.0 - 1.5 * atr)).abs() < 1e-9);
        assert!((signal.take_profit.unwrap() - (159.0 + 3.0 * atr)).abs() < 1e-9);
        assert!((signal.risk_reward.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_close_forces_none() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let mut bars = create_test_bars(&closes);
        bars[59].close = f64::NAN;

        for mode in [SignalMode::FlipConfirmed, SignalMode::StateFilter] {
            let config = SignalConfig {
                signal_mode: mode,
                ..SignalConfig::default()
            };
            let signal = generate_signal(&bars, &config);

            assert_eq!(signal.decision, Decision::NoSignal, "{mode}");
            assert_eq!(signal.ema, None);
            assert_eq!(signal.entry_price, None);
            assert_eq!(signal.stop_loss, None);
            assert_eq!(signal.take_profit, None);
        }
    }

    #[test]
    fn test_non_finite_multiplier_forces_none() {
        // Without the infinite multiplier this series is a state-filter BUY
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let bars = create_test_bars(&closes);
        let config = SignalConfig {
            signal_mode: SignalMode::StateFilter,
            supertrend_multiplier: f64::INFINITY,
            ..SignalConfig::default()
        };

        let signal = generate_signal(&bars, &config);

        assert_eq!(signal.decision, Decision::NoSignal);
        assert_eq!(signal.supertrend, None);
        assert_eq!(signal.entry_price, None);
        assert_eq!(signal.stop_loss, None);
        assert_eq!(signal.risk_reward, None);
    }

    #[test]
    fn test_flat_series_never_signals() {
        let bars: Vec<Bar> = create_test_bars(&[100.0; 50])
            .into_iter()
            .map(|bar| Bar {
                high: bar.close,
                low: bar.close,
                ..bar
            })
            .collect();
        for mode in [SignalMode::FlipConfirmed, SignalMode::StateFilter] {
            let config = SignalConfig {
                signal_mode: mode,
                ..SignalConfig::default()
            };
            for end in 1..=bars.len() {
                let signal = generate_signal(&bars[..end], &config);
                assert_eq!(signal.decision, Decision::NoSignal, "{mode} at {end}");
            }
        }
    }

    #[test]
    fn test_strategy_metadata() {
        let strategy = SupertrendEmaStrategy::default();
        assert_eq!(strategy.name(), "SupertrendEma");
        assert_eq!(strategy.min_bars_required(), 32);
    }
}

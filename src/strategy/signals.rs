use crate::models::{Bar, Decision};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Entry rule variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalMode {
    /// Fire only on the bar where Supertrend changes direction and the close
    /// is on the matching side of the EMA
    FlipConfirmed,
    /// Fire on every bar where Supertrend direction and the EMA side agree
    StateFilter,
}

impl fmt::Display for SignalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalMode::FlipConfirmed => write!(f, "flip_confirmed"),
            SignalMode::StateFilter => write!(f, "state_filter"),
        }
    }
}

impl FromStr for SignalMode {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "flip_confirmed" | "flip" => Ok(SignalMode::FlipConfirmed),
            "state_filter" | "state" => Ok(SignalMode::StateFilter),
            other => Err(ParamsError::UnknownSignalMode(other.to_string())),
        }
    }
}

/// How stop-loss and take-profit are derived once a signal fires
#[derive(Debug, Clone, PartialEq)]
pub enum ExitPolicy {
    /// SL/TP at fixed ATR multiples from entry. Without `atr_period` the
    /// Supertrend ATR is reused.
    AtrMultiple {
        atr_period: Option<usize>,
        sl_multiplier: f64,
        tp_multiplier: f64,
    },
    /// SL is the active Supertrend band; no TP or risk-reward
    SupertrendBand,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        ExitPolicy::AtrMultiple {
            atr_period: Some(14),
            sl_multiplier: 1.5,
            tp_multiplier: 3.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("{0} must be at least 1")]
    ZeroPeriod(&'static str),

    #[error("{name} must be a positive finite number, got {value}")]
    InvalidMultiplier { name: &'static str, value: f64 },

    #[error("guard margin must be at least 2, got {0}")]
    GuardMarginTooSmall(usize),

    #[error("unknown signal mode '{0}' (expected flip_confirmed or state_filter)")]
    UnknownSignalMode(String),
}

/// Parameters for the EMA + Supertrend signal
#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub ema_period: usize,
    pub supertrend_atr_period: usize,
    pub supertrend_multiplier: f64,
    pub exit: ExitPolicy,
    pub signal_mode: SignalMode,
    /// Extra bars beyond the longest period so the decision bar and the bar
    /// before it both have seeded indicators
    pub guard_margin: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            ema_period: 30,
            supertrend_atr_period: 10,
            supertrend_multiplier: 2.0,
            exit: ExitPolicy::default(),
            signal_mode: SignalMode::FlipConfirmed,
            guard_margin: 2,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), ParamsError> {
        check_period("ema_period", self.ema_period)?;
        check_period("supertrend_atr_period", self.supertrend_atr_period)?;
        check_multiplier("supertrend_multiplier", self.supertrend_multiplier)?;

        if let ExitPolicy::AtrMultiple {
            atr_period,
            sl_multiplier,
            tp_multiplier,
        } = &self.exit
        {
            if let Some(period) = atr_period {
                check_period("exit_atr_period", *period)?;
            }
            check_multiplier("sl_multiplier", *sl_multiplier)?;
            check_multiplier("tp_multiplier", *tp_multiplier)?;
        }

        if self.guard_margin < 2 {
            return Err(ParamsError::GuardMarginTooSmall(self.guard_margin));
        }

        Ok(())
    }

    /// Period of the ATR used for exits, if exits are ATR based
    pub fn exit_atr_period(&self) -> Option<usize> {
        match &self.exit {
            ExitPolicy::AtrMultiple { atr_period, .. } => {
                Some(atr_period.unwrap_or(self.supertrend_atr_period))
            }
            ExitPolicy::SupertrendBand => None,
        }
    }

    /// Minimum series length before the engine will evaluate
    ///
    /// # Example
    /// ```
    /// use trendscan::strategy::signals::SignalConfig;
    ///
    /// let config = SignalConfig::default();
    /// // longest period is the EMA (30), plus the guard margin of 2
    /// assert_eq!(config.min_bars_required(), 32);
    /// ```
    pub fn min_bars_required(&self) -> usize {
        let longest = self
            .ema_period
            .max(self.supertrend_atr_period)
            .max(self.exit_atr_period().unwrap_or(0));
        longest + self.guard_margin
    }
}

fn check_period(name: &'static str, period: usize) -> Result<(), ParamsError> {
    if period == 0 {
        return Err(ParamsError::ZeroPeriod(name));
    }
    Ok(())
}

fn check_multiplier(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ParamsError::InvalidMultiplier { name, value });
    }
    Ok(())
}

/// Stop-loss, take-profit and risk-reward for a fired signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitLevels {
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub risk_reward: Option<f64>,
}

/// Reward distance over risk distance, 0 when entry sits on the stop
pub fn risk_reward(entry: f64, stop_loss: f64, take_profit: f64) -> f64 {
    let risk = (entry - stop_loss).abs();
    let reward = (take_profit - entry).abs();
    if risk == 0.0 {
        0.0
    } else {
        reward / risk
    }
}

/// Exits at ATR multiples from the entry price
///
/// Returns `None` for [`Decision::NoSignal`].
pub fn atr_exit_levels(
    decision: Decision,
    entry: f64,
    atr: f64,
    sl_multiplier: f64,
    tp_multiplier: f64,
) -> Option<ExitLevels> {
    let (stop_loss, take_profit) = match decision {
        Decision::Buy => (entry - atr * sl_multiplier, entry + atr * tp_multiplier),
        Decision::Sell => (entry + atr * sl_multiplier, entry - atr * tp_multiplier),
        Decision::NoSignal => return None,
    };

    Some(ExitLevels {
        stop_loss,
        take_profit: Some(take_profit),
        risk_reward: Some(risk_reward(entry, stop_loss, take_profit)),
    })
}

/// Exit where the active Supertrend band is the stop
pub fn band_exit_levels(decision: Decision, band: f64) -> Option<ExitLevels> {
    if !decision.is_actionable() {
        return None;
    }

    Some(ExitLevels {
        stop_loss: band,
        take_profit: None,
        risk_reward: None,
    })
}

/// Validate that a fetched series can be handed to the engine
///
/// Bars must be strictly increasing in time and carry positive, finite
/// prices with high >= low.
pub fn validate_series(bars: &[Bar]) -> anyhow::Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            anyhow::bail!(
                "Bar {} at {} has a non-positive or non-finite price (o={} h={} l={} c={})",
                i,
                bar.timestamp,
                bar.open,
                bar.high,
                bar.low,
                bar.close
            );
        }
        if bar.high < bar.low {
            anyhow::bail!(
                "Bar {} at {} has high {} below low {}",
                i,
                bar.timestamp,
                bar.high,
                bar.low
            );
        }
    }

    for window in bars.windows(2) {
        if window[1].timestamp <= window[0].timestamp {
            anyhow::bail!(
                "Bars are not strictly increasing in time: {} followed by {}",
                window[0].timestamp.format("%Y-%m-%d %H:%M:%S"),
                window[1].timestamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}

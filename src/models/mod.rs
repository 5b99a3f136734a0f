use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OHLCV bar for a fixed interval
///
/// The symbol is not part of the bar; callers attach it when they build a
/// [`SignalRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

impl Bar {
    /// Midpoint of the bar's range, (high + low) / 2
    pub fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// Bar interval supported by the price provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    /// Interval code understood by the chart API
    pub fn interval(self) -> &'static str {
        match self {
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1d",
        }
    }

    /// History window requested for this interval
    ///
    /// Intraday data is only served for a limited range, so shorter intervals
    /// look back fewer days.
    pub fn lookback_range(self) -> &'static str {
        match self {
            Timeframe::FiveMinutes | Timeframe::FifteenMinutes => "10d",
            Timeframe::OneHour => "30d",
            Timeframe::OneDay => "1y",
        }
    }

    /// Length of one bar
    pub fn duration(self) -> Duration {
        match self {
            Timeframe::FiveMinutes => Duration::minutes(5),
            Timeframe::FifteenMinutes => Duration::minutes(15),
            Timeframe::OneHour => Duration::hours(1),
            Timeframe::OneDay => Duration::days(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interval())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "5m" => Ok(Timeframe::FiveMinutes),
            "15m" => Ok(Timeframe::FifteenMinutes),
            "1h" | "60m" => Ok(Timeframe::OneHour),
            "1d" => Ok(Timeframe::OneDay),
            other => Err(format!(
                "unsupported timeframe '{}' (expected 5m, 15m, 1h or 1d)",
                other
            )),
        }
    }
}

/// Supertrend state at a single bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
}

impl TrendDirection {
    pub fn is_up(self) -> bool {
        matches!(self, TrendDirection::Up)
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Up => write!(f, "UP"),
            TrendDirection::Down => write!(f, "DOWN"),
        }
    }
}

/// Trading decision produced by the signal engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "NONE")]
    NoSignal,
}

impl Decision {
    pub fn is_actionable(self) -> bool {
        !matches!(self, Decision::NoSignal)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Buy => write!(f, "BUY"),
            Decision::Sell => write!(f, "SELL"),
            Decision::NoSignal => write!(f, "NONE"),
        }
    }
}

/// Result of evaluating one series
///
/// Every numeric field is either a finite value or `None`; NaN never leaks
/// out of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub decision: Decision,
    pub timestamp: Option<DateTime<Utc>>,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub risk_reward: Option<f64>,
    pub ema: Option<f64>,
    pub atr: Option<f64>,
    pub supertrend: Option<f64>,
    pub direction: Option<TrendDirection>,
}

impl Signal {
    /// Signal with nothing populated, used when the series is too short
    pub fn none() -> Self {
        Self {
            decision: Decision::NoSignal,
            timestamp: None,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            risk_reward: None,
            ema: None,
            atr: None,
            supertrend: None,
            direction: None,
        }
    }

    /// Absolute distance between entry and stop, in price points
    pub fn risk_points(&self) -> Option<f64> {
        Some((self.entry_price? - self.stop_loss?).abs())
    }
}

/// A signal with the symbol it was computed for
///
/// This is what dispatchers and logs receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub symbol: String,
    pub signal: Signal,
    pub scanned_at: DateTime<Utc>,
}

impl SignalRecord {
    pub fn new(symbol: impl Into<String>, signal: Signal, scanned_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            signal,
            scanned_at,
        }
    }

    pub fn decision(&self) -> Decision {
        self.signal.decision
    }
}

// Technical indicators module
// EMA, ATR and Supertrend, each returned as a series aligned with the input bars

pub mod atr;
pub mod moving_average;
pub mod supertrend;

pub use atr::{calculate_atr, calculate_true_range};
pub use moving_average::{calculate_ema, ema_series};
pub use supertrend::{calculate_supertrend, SupertrendSeries};

// Trading strategy module
pub mod signals;
pub mod supertrend_ema;

use crate::models::{Bar, Signal};

pub use signals::{ExitPolicy, ParamsError, SignalConfig, SignalMode};
pub use supertrend_ema::{generate_signal, SupertrendEmaStrategy};

/// Base trait for signal strategies
///
/// Implementations are pure: the same bars always give the same signal and
/// nothing is retained between calls, so one instance can serve many
/// concurrent scans.
pub trait Strategy: Send + Sync {
    /// Evaluate the latest bar of `bars`
    ///
    /// A series that is too short yields a `NONE` signal, not an error.
    fn generate_signal(&self, bars: &[Bar]) -> Signal;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum bars required before a decision can be made
    fn min_bars_required(&self) -> usize;
}

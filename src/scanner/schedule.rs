use super::{MarketHours, Scanner};
use chrono::{Timelike, Utc};
use std::future::Future;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// When and how often the scheduled scan runs
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub poll_interval: Duration,
    pub market_hours: MarketHours,
    /// Scan even when the market is closed
    pub ignore_market_hours: bool,
    /// Delay the first tick to the next wall-clock multiple of the interval
    pub align_to_clock: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5 * 60),
            market_hours: MarketHours::default(),
            ignore_market_hours: false,
            align_to_clock: true,
        }
    }
}

/// Time until the next wall-clock boundary of `every` (XX:00, XX:05, ... for 5 min)
fn until_next_boundary(every: Duration) -> Duration {
    let period = every.as_secs().max(1);
    let now = Utc::now();
    let seconds_into_day = u64::from(now.num_seconds_from_midnight());
    let remainder = seconds_into_day % period;
    if remainder == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs(period - remainder)
    }
}

/// Scan `symbols` on a fixed interval until `shutdown` resolves
///
/// Ticks outside market hours are skipped. Alerts and journal rows are
/// produced through [`Scanner::scan_and_notify`]. Returns the number of scans
/// that ran.
pub async fn run_scheduled<F>(
    scanner: &Scanner,
    symbols: &[String],
    config: &ScheduleConfig,
    shutdown: F,
) -> usize
where
    F: Future<Output = ()>,
{
    let start = if config.align_to_clock {
        Instant::now() + until_next_boundary(config.poll_interval)
    } else {
        Instant::now()
    };

    tracing::info!(
        symbols = symbols.len(),
        interval_secs = config.poll_interval.as_secs(),
        first_scan_in = ?(start - Instant::now()),
        "🔄 Scheduler started"
    );

    let mut ticker = interval_at(start, config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::pin!(shutdown);
    let mut scans = 0usize;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("⚠️  Shutdown requested, stopping scheduler");
                break;
            }
            _ = ticker.tick() => {
                let now = Utc::now();
                if !config.ignore_market_hours && !config.market_hours.is_open(now) {
                    tracing::info!(
                        local_time = %config.market_hours.local_time(now),
                        "Market closed, skipping scan"
                    );
                    continue;
                }

                let report = scanner.scan_and_notify(symbols).await;
                scans += 1;
                tracing::info!(
                    scan_id = %report.scan_id,
                    signals = report.signal_count(),
                    failed = report.failures.len(),
                    "Scheduled scan finished"
                );
            }
        }
    }

    scans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::tests::{trending_bars, FakeProvider};
    use crate::strategy::SupertrendEmaStrategy;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fake_scanner() -> (Scanner, Arc<FakeProvider>) {
        let mut series = HashMap::new();
        series.insert("TREND.NS".to_string(), trending_bars(60));
        let provider = Arc::new(FakeProvider {
            series,
            calls: AtomicUsize::new(0),
        });
        let scanner = Scanner::new(provider.clone(), Arc::new(SupertrendEmaStrategy::default()));
        (scanner, provider)
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_shutdown() {
        let (scanner, provider) = fake_scanner();
        let config = ScheduleConfig {
            poll_interval: Duration::from_secs(60),
            ignore_market_hours: true,
            align_to_clock: false,
            ..ScheduleConfig::default()
        };

        // Ticks at 0s, 60s and 120s land before the shutdown at 150s
        let shutdown = tokio::time::sleep(Duration::from_secs(150));
        let scans = run_scheduled(&scanner, &["TREND.NS".to_string()], &config, shutdown).await;

        assert_eq!(scans, 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_market_skips_scans() {
        let (scanner, provider) = fake_scanner();
        let closed = MarketHours::new(
            chrono_tz::UTC,
            chrono::NaiveTime::MIN,
            chrono::NaiveTime::MIN,
        );
        let config = ScheduleConfig {
            poll_interval: Duration::from_secs(60),
            market_hours: closed,
            ignore_market_hours: false,
            align_to_clock: false,
        };

        let shutdown = tokio::time::sleep(Duration::from_secs(150));
        let scans = run_scheduled(&scanner, &["TREND.NS".to_string()], &config, shutdown).await;

        assert_eq!(scans, 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_boundary_is_within_one_period() {
        let wait = until_next_boundary(Duration::from_secs(300));
        assert!(wait < Duration::from_secs(300));
    }
}

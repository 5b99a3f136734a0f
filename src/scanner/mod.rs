pub mod market_hours;
pub mod schedule;

pub use market_hours::MarketHours;
pub use schedule::{run_scheduled, ScheduleConfig};

use crate::alerts::AlertDispatcher;
use crate::api::PriceProvider;
use crate::models::{SignalRecord, Timeframe};
use crate::persistence::SignalLog;
use crate::strategy::signals::validate_series;
use crate::strategy::Strategy;
use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

const DEFAULT_CONCURRENCY: usize = 8;

/// A symbol that could not be evaluated
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: String,
}

/// Everything one pass over the symbol list produced
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// One record per evaluated symbol, in input order, including NONE
    pub records: Vec<SignalRecord>,
    pub failures: Vec<SymbolFailure>,
}

impl ScanReport {
    /// Records with a BUY or SELL decision
    pub fn actionable(&self) -> impl Iterator<Item = &SignalRecord> {
        self.records.iter().filter(|r| r.decision().is_actionable())
    }

    pub fn signal_count(&self) -> usize {
        self.actionable().count()
    }
}

/// Scans symbols with a strategy and forwards actionable signals
///
/// Symbols are fetched and evaluated concurrently up to a fixed limit. A symbol
/// that fails to fetch or validate is reported in the [`ScanReport`] and never
/// stops the rest of the scan.
pub struct Scanner {
    provider: Arc<dyn PriceProvider>,
    strategy: Arc<dyn Strategy>,
    dispatcher: AlertDispatcher,
    logs: Vec<Box<dyn SignalLog>>,
    timeframe: Timeframe,
    concurrency: usize,
}

impl Scanner {
    pub fn new(provider: Arc<dyn PriceProvider>, strategy: Arc<dyn Strategy>) -> Self {
        Self {
            provider,
            strategy,
            dispatcher: AlertDispatcher::new(),
            logs: Vec::new(),
            timeframe: Timeframe::FifteenMinutes,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: AlertDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_log(mut self, log: Box<dyn SignalLog>) -> Self {
        self.logs.push(log);
        self
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Fetch, validate and evaluate one symbol
    pub async fn evaluate(&self, symbol: &str) -> anyhow::Result<SignalRecord> {
        let bars = self
            .provider
            .fetch_bars(symbol, self.timeframe)
            .await
            .with_context(|| format!("Failed to fetch {} bars for {}", self.timeframe, symbol))?;

        validate_series(&bars).with_context(|| format!("Malformed series for {}", symbol))?;

        let signal = self.strategy.generate_signal(&bars);
        Ok(SignalRecord::new(symbol, signal, Utc::now()))
    }

    /// Evaluate every symbol without notifying anyone
    pub async fn scan(&self, symbols: &[String]) -> ScanReport {
        let scan_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = tracing::info_span!("scan", %scan_id, timeframe = %self.timeframe);

        async move {
            tracing::info!(
                symbols = symbols.len(),
                strategy = self.strategy.name(),
                "🔍 Scanning"
            );

            let mut results: Vec<(usize, String, anyhow::Result<SignalRecord>)> =
                stream::iter(symbols.iter().enumerate())
                    .map(|(index, symbol)| async move {
                        (index, symbol.clone(), self.evaluate(symbol).await)
                    })
                    .buffer_unordered(self.concurrency)
                    .collect()
                    .await;
            results.sort_by_key(|(index, _, _)| *index);

            let mut records = Vec::with_capacity(results.len());
            let mut failures = Vec::new();
            for (_, symbol, result) in results {
                match result {
                    Ok(record) => {
                        tracing::debug!(
                            symbol = %record.symbol,
                            decision = %record.decision(),
                            "Evaluated"
                        );
                        records.push(record);
                    }
                    Err(e) => {
                        tracing::warn!(symbol = %symbol, "✗ Skipping symbol: {:#}", e);
                        failures.push(SymbolFailure {
                            symbol,
                            error: format!("{:#}", e),
                        });
                    }
                }
            }

            let report = ScanReport {
                scan_id,
                started_at,
                records,
                failures,
            };
            tracing::info!(
                evaluated = report.records.len(),
                signals = report.signal_count(),
                failed = report.failures.len(),
                "✅ Scan complete"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Scan, then alert on and journal every actionable signal
    pub async fn scan_and_notify(&self, symbols: &[String]) -> ScanReport {
        let report = self.scan(symbols).await;

        for record in report.actionable() {
            self.dispatcher.dispatch(record).await;

            for log in &self.logs {
                if let Err(e) = log.append(record).await {
                    tracing::warn!(log = log.name(), symbol = %record.symbol, "Failed to log signal: {}", e);
                }
            }
        }

        report
    }
}

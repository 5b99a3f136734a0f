pub mod csv_log;
pub mod sheets;

pub use csv_log::CsvSignalLog;
pub use sheets::GoogleSheetsLog;

use crate::models::SignalRecord;
use async_trait::async_trait;
use chrono_tz::Asia::Kolkata;
use serde::Serialize;
use thiserror::Error;

/// Errors from signal logs
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to write signal log: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode CSV row: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid sheets URL: {0}")]
    InvalidUrl(String),

    #[error("sheets API returned HTTP {status}: {detail}")]
    Rejected {
        status: reqwest::StatusCode,
        detail: String,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("signal log task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Append-only journal of emitted signals
#[async_trait]
pub trait SignalLog: Send + Sync {
    fn name(&self) -> &str;

    async fn append(&self, record: &SignalRecord) -> Result<(), LogError>;
}

/// One journal row
///
/// Exit columns stay empty; they are filled in by hand once the trade is
/// managed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Signal")]
    pub decision: String,
    #[serde(rename = "Entry")]
    pub entry: String,
    #[serde(rename = "Stop Loss")]
    pub stop_loss: String,
    #[serde(rename = "Take Profit")]
    pub take_profit: String,
    #[serde(rename = "Risk")]
    pub risk: String,
    #[serde(rename = "Risk Reward")]
    pub risk_reward: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Exit Price")]
    pub exit_price: String,
    #[serde(rename = "Exit Time")]
    pub exit_time: String,
    #[serde(rename = "PnL")]
    pub pnl: String,
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

impl SignalRow {
    pub const STATUS_PENDING: &'static str = "PENDING";

    pub fn from_record(record: &SignalRecord) -> Self {
        let s = &record.signal;
        Self {
            timestamp: record
                .scanned_at
                .with_timezone(&Kolkata)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            symbol: record.symbol.clone(),
            decision: s.decision.to_string(),
            entry: cell(s.entry_price),
            stop_loss: cell(s.stop_loss),
            take_profit: cell(s.take_profit),
            risk: cell(s.risk_points()),
            risk_reward: cell(s.risk_reward),
            status: Self::STATUS_PENDING.to_string(),
            exit_price: String::new(),
            exit_time: String::new(),
            pnl: String::new(),
        }
    }

    /// Cells in column order
    pub fn into_values(self) -> Vec<String> {
        vec![
            self.timestamp,
            self.symbol,
            self.decision,
            self.entry,
            self.stop_loss,
            self.take_profit,
            self.risk,
            self.risk_reward,
            self.status,
            self.exit_price,
            self.exit_time,
            self.pnl,
        ]
    }
}

pub mod format;
pub mod telegram;
pub mod twilio;

pub use telegram::TelegramChannel;
pub use twilio::{SmsChannel, TwilioCredentials, WhatsAppChannel};

use crate::models::SignalRecord;
use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;

/// Errors from alert channels
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("{channel} is not configured: missing {missing}")]
    NotConfigured {
        channel: &'static str,
        missing: &'static str,
    },

    #[error("{channel} rejected the message (HTTP {status}): {detail}")]
    Rejected {
        channel: &'static str,
        status: reqwest::StatusCode,
        detail: String,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A destination that signal alerts can be sent to
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, record: &SignalRecord) -> Result<(), AlertError>;
}

/// Outcome of fanning one record out to every channel
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

/// Sends actionable signals to every configured channel
#[derive(Default)]
pub struct AlertDispatcher {
    channels: Vec<Box<dyn AlertChannel>>,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: Box<dyn AlertChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn add_channel(&mut self, channel: Box<dyn AlertChannel>) {
        self.channels.push(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send `record` to all channels concurrently
    ///
    /// NONE records are dropped without contacting any channel. A channel that
    /// fails is logged and recorded in the summary; the rest still run.
    pub async fn dispatch(&self, record: &SignalRecord) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        if !record.decision().is_actionable() {
            tracing::debug!(symbol = %record.symbol, "No actionable signal, skipping alerts");
            return summary;
        }

        let results = join_all(self.channels.iter().map(|channel| async move {
            (channel.name().to_string(), channel.send(record).await)
        }))
        .await;

        for (name, result) in results {
            match result {
                Ok(()) => {
                    tracing::info!(
                        channel = %name,
                        symbol = %record.symbol,
                        decision = %record.decision(),
                        "Alert sent"
                    );
                    summary.delivered.push(name);
                }
                Err(e) => {
                    tracing::warn!(channel = %name, symbol = %record.symbol, "Alert failed: {}", e);
                    summary.failed.push(name);
                }
            }
        }

        summary
    }
}

pub mod yahoo;

pub use yahoo::YahooClient;

use crate::models::{Bar, Timeframe};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from a price series provider
#[derive(Debug, Error)]
pub enum DataError {
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("no usable bars returned for {0}")]
    EmptySeries(String),

    #[error("HTTP {status} for {symbol}")]
    Status {
        symbol: String,
        status: reqwest::StatusCode,
    },

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),

    #[error("invalid request url: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl DataError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            DataError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// Source of ordered OHLC bars for a symbol
///
/// Implementations return bars sorted by timestamp without duplicates.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, DataError>;
}

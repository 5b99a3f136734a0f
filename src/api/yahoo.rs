use super::{DataError, PriceProvider};
use crate::models::{Bar, Timeframe};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

const YAHOO_API_BASE: &str = "https://query2.finance.yahoo.com";
const RATE_LIMIT_RPM: u32 = 120;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

type YahooRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Response from the v8 chart endpoint
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Client for Yahoo Finance chart data
///
/// Cloneable; all clones share one rate limiter.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<YahooRateLimiter>,
    initial_backoff: Duration,
}

impl YahooClient {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(YAHOO_API_BASE)
    }

    /// Point the client at another host (used by tests)
    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36")
            .build()
            .context("Failed to build HTTP client")?;

        let quota = Quota::per_minute(
            NonZeroU32::new(RATE_LIMIT_RPM).context("Rate limit must be non-zero")?,
        );

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    fn chart_url(&self, symbol: &str, timeframe: Timeframe) -> Result<Url, DataError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DataError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| DataError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);

        url.query_pairs_mut()
            .append_pair("interval", timeframe.interval())
            .append_pair("range", timeframe.lookback_range());

        Ok(url)
    }

    /// Fetch bars for a symbol with retry and exponential backoff
    pub async fn get_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, DataError> {
        let mut attempt = 1;

        loop {
            match self.fetch_bars_once(symbol, timeframe).await {
                Ok(bars) => {
                    if attempt > 1 {
                        tracing::info!(symbol, attempt, "Fetched bars after retry");
                    }
                    return Ok(bars);
                }
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    let backoff = self.initial_backoff * 2_u32.pow(attempt - 1);
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}. Retrying in {:?}...",
                        attempt,
                        MAX_RETRIES,
                        symbol,
                        e,
                        backoff
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_bars_once(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, DataError> {
        let url = self.chart_url(symbol, timeframe)?;

        self.rate_limiter.until_ready().await;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }
        if !status.is_success() {
            return Err(DataError::Status {
                symbol: symbol.to_string(),
                status,
            });
        }

        let chart: ChartResponse = response.json().await.map_err(|e| {
            DataError::ResponseFormat(format!("failed to parse chart for {}: {}", symbol, e))
        })?;

        let mut bars = parse_chart(symbol, chart)?;
        if drop_forming_bar(&mut bars, timeframe, Utc::now()) {
            tracing::debug!(symbol, "Dropped bar that is still forming");
        }
        if bars.is_empty() {
            return Err(DataError::EmptySeries(symbol.to_string()));
        }
        tracing::debug!(symbol, bars = bars.len(), interval = %timeframe, "Fetched bars");
        Ok(bars)
    }
}

#[async_trait]
impl PriceProvider for YahooClient {
    async fn fetch_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, DataError> {
        self.get_bars(symbol, timeframe).await
    }
}

/// Turn a chart response into sorted, de-duplicated bars
///
/// Rows with any missing OHLC value are dropped.
fn parse_chart(symbol: &str, response: ChartResponse) -> Result<Vec<Bar>, DataError> {
    let result = match (response.chart.result, response.chart.error) {
        (Some(result), _) => result,
        (None, Some(err)) if err.code == "Not Found" => {
            return Err(DataError::SymbolNotFound(symbol.to_string()))
        }
        (None, Some(err)) => {
            return Err(DataError::ResponseFormat(format!(
                "{}: {}",
                err.code, err.description
            )))
        }
        (None, None) => {
            return Err(DataError::ResponseFormat(
                "empty result with no error".to_string(),
            ))
        }
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormat("result array is empty".to_string()))?;

    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormat("no quote data".to_string()))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            value_at(&quote.open, i),
            value_at(&quote.high, i),
            value_at(&quote.low, i),
            value_at(&quote.close, i),
        ) else {
            continue;
        };

        let timestamp = DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| DataError::ResponseFormat(format!("invalid timestamp: {}", ts)))?;

        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: value_at(&quote.volume, i),
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);

    if bars.is_empty() {
        return Err(DataError::EmptySeries(symbol.to_string()));
    }

    Ok(bars)
}

/// Remove the last bar when its interval has not elapsed at `now`
///
/// The chart endpoint serves the live bar during a session; decisions are
/// only taken on closed bars.
fn drop_forming_bar(bars: &mut Vec<Bar>, timeframe: Timeframe, now: DateTime<Utc>) -> bool {
    match bars.last() {
        Some(last) if last.timestamp + timeframe.duration() > now => {
            bars.pop();
            true
        }
        _ => false,
    }
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const CHART_BODY: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1709524800, 1709523900, 1709525700, 1709524800, 1709526600],
                "indicators": {
                    "quote": [{
                        "open":   [101.0, 100.0, 102.0, 101.0, null],
                        "high":   [102.5, 101.5, 103.0, 102.5, 104.0],
                        "low":    [100.5,  99.5, 101.5, 100.5, 102.0],
                        "close":  [102.0, 101.0, 102.5, 102.0, 103.5],
                        "volume": [1200, 1000, null, 1200, 900]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    fn chart_path(symbol: &str) -> Matcher {
        Matcher::Regex(format!("^/v8/finance/chart/{}", symbol.replace('.', r"\.")))
    }

    #[tokio::test]
    async fn test_get_bars_parses_sorts_and_drops_incomplete_rows() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", chart_path("RELIANCE.NS"))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("interval".into(), "15m".into()),
                Matcher::UrlEncoded("range".into(), "10d".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(CHART_BODY)
            .create_async()
            .await;

        let client = YahooClient::with_base_url(server.url()).unwrap();
        let bars = client
            .get_bars("RELIANCE.NS", Timeframe::FifteenMinutes)
            .await
            .unwrap();

        mock.assert_async().await;

        // One duplicate timestamp removed, one row with a null open dropped
        assert_eq!(bars.len(), 3);
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(bars[0].close, 101.0);
        assert_eq!(bars[0].volume, Some(1000.0));
        assert_eq!(bars[2].close, 102.5);
        assert_eq!(bars[2].volume, None);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", chart_path("NOPE.NS"))
            .with_status(404)
            .with_body(r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = YahooClient::with_base_url(server.url()).unwrap();
        let err = client
            .get_bars("NOPE.NS", Timeframe::OneDay)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, DataError::SymbolNotFound(ref s) if s == "NOPE.NS"));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", chart_path("INFY.NS"))
            .with_status(503)
            .expect(MAX_RETRIES as usize)
            .create_async()
            .await;

        let client = YahooClient::with_base_url(server.url())
            .unwrap()
            .with_backoff(Duration::from_millis(1));
        let err = client
            .get_bars("INFY.NS", Timeframe::FiveMinutes)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, DataError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn test_chart_url_encodes_index_symbols() {
        let client = YahooClient::with_base_url("https://example.com/").unwrap();
        let url = client.chart_url("^NSEI", Timeframe::OneHour).unwrap();

        assert!(url.path().starts_with("/v8/finance/chart/"));
        assert!(url.path().ends_with("NSEI"));
        assert_eq!(url.query(), Some("interval=1h&range=30d"));
    }

    #[test]
    fn test_parse_chart_error_payload() {
        let response: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid range"}}}"#,
        )
        .unwrap();

        let err = parse_chart("TCS.NS", response).unwrap_err();
        assert!(err.to_string().contains("Invalid range"));
    }

    fn bar_at(timestamp: DateTime<Utc>) -> Bar {
        Bar {
            timestamp,
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: None,
        }
    }

    #[test]
    fn test_forming_bar_is_dropped() {
        let open = DateTime::from_timestamp(1_709_523_900, 0).unwrap();
        let mut bars = vec![
            bar_at(open),
            bar_at(open + chrono::Duration::minutes(15)),
        ];

        // Ten minutes into the second 15m bar
        let now = open + chrono::Duration::minutes(25);
        assert!(drop_forming_bar(&mut bars, Timeframe::FifteenMinutes, now));
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, open);

        // The first bar closed at +15m
        assert!(!drop_forming_bar(&mut bars, Timeframe::FifteenMinutes, now));
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn test_closed_bar_is_kept() {
        let open = DateTime::from_timestamp(1_709_523_900, 0).unwrap();
        let mut bars = vec![bar_at(open)];

        let now = open + chrono::Duration::minutes(15);
        assert!(!drop_forming_bar(&mut bars, Timeframe::FifteenMinutes, now));
        assert!(drop_forming_bar(&mut bars, Timeframe::OneHour, now));
        assert!(bars.is_empty());
        assert!(!drop_forming_bar(&mut bars, Timeframe::OneHour, now));
    }
}

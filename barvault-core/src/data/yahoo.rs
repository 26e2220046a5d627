//! Yahoo Finance price source.
//!
//! Fetches daily OHLCV rows from Yahoo's v8 chart API. One HTTP attempt per
//! call; backoff is the fetcher's job. Responses are mapped onto the
//! `DataError` taxonomy and reported to the shared circuit breaker.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataSource, FetchResult, PriceSource, RawBar};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance v8 chart API response.
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
    description: Option<String>,
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

#[derive(Debug, Default, Deserialize)]
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
    volume: Vec<Option<u64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: CHART_BASE.to_string(),
        })
    }

    /// Point the provider at a different chart endpoint (mirrors, recorded fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the chart API URL. Without a start date the full history is requested.
    fn chart_url(&self, symbol: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
        let Some(start) = start else {
            return format!(
                "{}/{symbol}?range=max&interval=1d&events=history",
                self.base_url
            );
        };
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = match end {
            Some(end) => end
                .succ_opt()
                .unwrap_or(end)
                .and_time(chrono::NaiveTime::MIN)
                .and_utc()
                .timestamp(),
            None => Utc::now().timestamp(),
        };
        format!(
            "{}/{symbol}?period1={start_ts}&period2={end_ts}&interval=1d&events=history",
            self.base_url
        )
    }

    /// Parse the chart API response into raw rows.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<RawBar>, DataError> {
        let result = match (resp.chart.result, resp.chart.error) {
            (Some(result), _) => result,
            (None, Some(err)) if err.code.eq_ignore_ascii_case("Not Found") => {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            }
            (None, Some(err)) => {
                return Err(DataError::ResponseFormatChanged(format!(
                    "{}: {}",
                    err.code,
                    err.description.unwrap_or_default()
                )))
            }
            (None, None) => {
                return Err(DataError::ResponseFormatChanged(
                    "empty result with no error".into(),
                ))
            }
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };
        // A listed symbol with no trades in the range has no timestamp array.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };
        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let row = RawBar {
                date,
                open: quote.open.get(i).copied().flatten(),
                high: quote.high.get(i).copied().flatten(),
                low: quote.low.get(i).copied().flatten(),
                close: quote.close.get(i).copied().flatten(),
                volume: quote.volume.get(i).copied().flatten(),
            };

            // Holidays show up as all-null rows
            if row.open.is_none()
                && row.high.is_none()
                && row.low.is_none()
                && row.close.is_none()
                && row.volume.is_none()
            {
                continue;
            }
            bars.push(row);
        }

        Ok(bars)
    }

    fn fetch_once(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<RawBar>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = self.chart_url(symbol, start, end);
        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                self.circuit_breaker.record_failure();
            }
            DataError::NetworkUnreachable(e.to_string())
        })?;

        let status = resp.status();
        match status {
            reqwest::StatusCode::FORBIDDEN => {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                self.circuit_breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(DataError::RateLimited { retry_after_secs });
            }
            reqwest::StatusCode::UNAUTHORIZED => {
                return Err(DataError::AuthenticationRequired(
                    "Yahoo Finance requires authentication".into(),
                ));
            }
            reqwest::StatusCode::NOT_FOUND => {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            s if s.is_server_error() => {
                self.circuit_breaker.record_failure();
                return Err(DataError::Upstream { status: s.as_u16() });
            }
            s if !s.is_success() => return Err(DataError::Upstream { status: s.as_u16() }),
            _ => {}
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;
        let bars = Self::parse_response(symbol, chart)?;
        self.circuit_breaker.record_success();
        Ok(bars)
    }
}

impl PriceSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<FetchResult, DataError> {
        let bars = self.fetch_once(symbol, start, end)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

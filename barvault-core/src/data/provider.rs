//! Price source trait and structured fetch errors.
//!
//! The PriceSource trait abstracts over the upstream bar service (Yahoo Finance
//! in production) so the fetcher can be driven by scripted fakes in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Daily row exactly as the source reported it, before the typed-boundary check.
///
/// Any field may be missing; `fetch::validate_rows` decides what survives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

/// Structured error types for price fetches.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::NetworkUnreachable(_) | DataError::RateLimited { .. } => true,
            DataError::Upstream { status } => *status >= 500,
            _ => false,
        }
    }

    /// Minimum wait the provider asked for before the next attempt.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            DataError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Result of a successful fetch for a single symbol. `bars` may be empty.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<RawBar>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Fixture,
}

/// Upstream price-bar service.
///
/// `start = None` asks for the full available history; `end = None` means
/// "through today" by the source's clock. Implementations make a single
/// attempt; retries belong to the fetcher.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch daily OHLCV rows for a symbol over an optional date range.
    fn fetch(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<FetchResult, DataError>;

    /// Check if the source is currently accepting requests (breaker closed).
    fn is_available(&self) -> bool;
}

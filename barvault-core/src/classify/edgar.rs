//! SEC EDGAR industry-code lookup.
//!
//! Two endpoints: `company_tickers.json` maps tickers to CIK numbers (fetched
//! once per process, shared read-only by every worker), and
//! `submissions/CIK##########.json` carries the company's `sic` field.
//! A failed ticker-map load is remembered for a cooldown so an EDGAR outage
//! costs one timeout, not one per symbol.
//! EDGAR rejects requests without a descriptive User-Agent and throttles
//! clients above ten requests per second.

use super::{ClassifyError, IndustryCodeSource};
use crate::domain::provider_symbol;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
pub const SUBMISSIONS_BASE: &str = "https://data.sec.gov/submissions";

const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(110);
const TICKER_MAP_RETRY_COOLDOWN: Duration = Duration::from_secs(600);

#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
}

#[derive(Debug, Deserialize)]
struct Submissions {
    #[serde(default)]
    sic: Option<String>,
}

type TickerMap = HashMap<String, u64>;

enum TickerState {
    Unloaded,
    Loaded(Arc<TickerMap>),
    Failed { reason: String, at: Instant },
}

pub struct EdgarClient {
    client: reqwest::blocking::Client,
    tickers_url: String,
    submissions_base: String,
    tickers: Mutex<TickerState>,
    last_request: Mutex<Option<Instant>>,
}

impl EdgarClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ClassifyError> {
        if user_agent.trim().is_empty() {
            return Err(ClassifyError::Unavailable(
                "EDGAR requires a non-empty User-Agent".into(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ClassifyError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            tickers_url: COMPANY_TICKERS_URL.to_string(),
            submissions_base: SUBMISSIONS_BASE.to_string(),
            tickers: Mutex::new(TickerState::Unloaded),
            last_request: Mutex::new(None),
        })
    }

    pub fn with_base_urls(
        mut self,
        tickers_url: impl Into<String>,
        submissions_base: impl Into<String>,
    ) -> Self {
        self.tickers_url = tickers_url.into();
        self.submissions_base = submissions_base.into();
        self
    }

    fn submissions_url(&self, cik: u64) -> String {
        format!("{}/CIK{cik:010}.json", self.submissions_base)
    }

    /// Space requests out so the whole pool stays under EDGAR's rate limit.
    fn throttle(&self) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                std::thread::sleep(MIN_REQUEST_INTERVAL - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    fn get_text(&self, url: &str) -> Result<Option<String>, ClassifyError> {
        self.throttle();
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| ClassifyError::Unavailable(format!("GET {url}: {e}")))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ClassifyError::Unavailable(format!("GET {url}: HTTP {status}")));
        }
        resp.text()
            .map(Some)
            .map_err(|e| ClassifyError::Unavailable(format!("read {url}: {e}")))
    }

    /// The ticker map, loading it on first use. Workers waiting on the lock
    /// share one load; a failure is returned without a request until the
    /// cooldown has passed.
    fn ticker_map(&self) -> Result<Arc<TickerMap>, ClassifyError> {
        let mut guard = self
            .tickers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match &*guard {
            TickerState::Loaded(map) => return Ok(Arc::clone(map)),
            TickerState::Failed { reason, at } if at.elapsed() < TICKER_MAP_RETRY_COOLDOWN => {
                return Err(ClassifyError::Unavailable(reason.clone()));
            }
            TickerState::Failed { .. } | TickerState::Unloaded => {}
        }
        match self.load_ticker_map() {
            Ok(map) => {
                tracing::info!(tickers = map.len(), "loaded EDGAR ticker map");
                *guard = TickerState::Loaded(Arc::clone(&map));
                Ok(map)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(error = %reason, "EDGAR ticker map unavailable");
                *guard = TickerState::Failed {
                    reason: reason.clone(),
                    at: Instant::now(),
                };
                Err(ClassifyError::Unavailable(reason))
            }
        }
    }

    fn load_ticker_map(&self) -> Result<Arc<TickerMap>, ClassifyError> {
        let body = self.get_text(&self.tickers_url)?.ok_or_else(|| {
            ClassifyError::Unavailable(format!("{} returned 404", self.tickers_url))
        })?;
        Ok(Arc::new(parse_ticker_map(&body)?))
    }
}

impl IndustryCodeSource for EdgarClient {
    fn industry_code(&self, symbol: &str) -> Result<Option<String>, ClassifyError> {
        let map = self.ticker_map()?;
        let Some(&cik) = map.get(&edgar_ticker(symbol)) else {
            return Ok(None);
        };
        match self.get_text(&self.submissions_url(cik))? {
            Some(body) => parse_sic(&body),
            None => Ok(None),
        }
    }
}

/// EDGAR writes class shares with a dash (`BRK-B`), upper case.
fn edgar_ticker(symbol: &str) -> String {
    provider_symbol(symbol).to_ascii_uppercase()
}

pub(crate) fn parse_ticker_map(body: &str) -> Result<TickerMap, ClassifyError> {
    let entries: HashMap<String, TickerEntry> = serde_json::from_str(body)
        .map_err(|e| ClassifyError::Unavailable(format!("unexpected ticker map format: {e}")))?;
    Ok(entries
        .into_values()
        .map(|e| (e.ticker.to_ascii_uppercase(), e.cik_str))
        .collect())
}

/// The `sic` field; funds and trusts usually carry an empty string.
pub(crate) fn parse_sic(body: &str) -> Result<Option<String>, ClassifyError> {
    let subs: Submissions = serde_json::from_str(body)
        .map_err(|e| ClassifyError::Unavailable(format!("unexpected submissions format: {e}")))?;
    Ok(subs
        .sic
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

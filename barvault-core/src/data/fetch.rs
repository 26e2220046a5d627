//! Incremental fetcher — decides the request range for one symbol and enforces
//! the typed PriceBar boundary on whatever comes back.
//!
//! The checkpoint is the date of the canonical series' last bar. The request
//! starts *at* that date rather than the day after, so the latest stored bar
//! (possibly a partial intraday bar) is always refetched; the merge step keeps
//! the newer copy.

use super::provider::{DataError, PriceSource, RawBar};
use super::retry::RetryPolicy;
use crate::domain::PriceBar;
use chrono::NaiveDate;

/// Date range asked of the price source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    /// `None` requests the instrument's full history.
    pub start: Option<NaiveDate>,
    /// `None` means "through today" by the source's clock.
    pub end: Option<NaiveDate>,
}

impl FetchPlan {
    pub fn for_checkpoint(existing_last_date: Option<NaiveDate>) -> Self {
        Self {
            start: existing_last_date,
            end: None,
        }
    }

    pub fn is_full_history(&self) -> bool {
        self.start.is_none()
    }
}

/// Bars that passed validation, plus the rows that were quarantined.
#[derive(Debug, Clone, Default)]
pub struct FetchedBars {
    pub bars: Vec<PriceBar>,
    pub rejected: Vec<RawBar>,
}

pub struct IncrementalFetcher<'a> {
    source: &'a dyn PriceSource,
    retry: RetryPolicy,
}

impl<'a> IncrementalFetcher<'a> {
    pub fn new(source: &'a dyn PriceSource, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// Fetch everything needed to bring a series with the given checkpoint up to date.
    ///
    /// Transient failures are retried per the policy; `SymbolNotFound` and other
    /// terminal errors return immediately. An open circuit breaker fails fast.
    pub fn fetch(
        &self,
        symbol: &str,
        existing_last_date: Option<NaiveDate>,
    ) -> Result<FetchedBars, DataError> {
        let plan = FetchPlan::for_checkpoint(existing_last_date);
        if !self.source.is_available() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let result = self.retry.run(symbol, |attempt| {
            if attempt > 1 && !self.source.is_available() {
                return Err(DataError::CircuitBreakerTripped);
            }
            self.source.fetch(symbol, plan.start, plan.end)
        })?;

        let fetched = validate_rows(result.bars);
        if !fetched.rejected.is_empty() {
            tracing::warn!(
                %symbol,
                rejected = fetched.rejected.len(),
                "quarantined malformed rows from {}",
                self.source.name()
            );
        }
        tracing::debug!(
            %symbol,
            full_history = plan.is_full_history(),
            bars = fetched.bars.len(),
            "fetched bars"
        );
        Ok(fetched)
    }
}

/// Split raw rows into typed bars and rejects.
///
/// A row is rejected when any price is missing, non-finite or non-positive.
/// A missing volume is read as zero (the source omits it on some thin days).
pub fn validate_rows(rows: Vec<RawBar>) -> FetchedBars {
    let mut out = FetchedBars::default();
    for row in rows {
        match to_price_bar(&row) {
            Some(bar) => out.bars.push(bar),
            None => out.rejected.push(row),
        }
    }
    out
}

fn to_price_bar(row: &RawBar) -> Option<PriceBar> {
    let bar = PriceBar {
        date: row.date,
        open: row.open?,
        high: row.high?,
        low: row.low?,
        close: row.close?,
        volume: row.volume.unwrap_or(0),
    };
    bar.is_valid().then_some(bar)
}

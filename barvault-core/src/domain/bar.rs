//! PriceBar — one daily OHLCV observation for one instrument.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar as stored in the canonical series.
///
/// Prices are whatever the upstream source already adjusted; no corporate-action
/// logic is applied here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Returns true if any price field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .any(|p| !p.is_finite())
    }

    /// Typed-boundary check: every price finite and strictly positive.
    ///
    /// High/low ordering is not enforced; upstream sources occasionally report
    /// a close a cent outside the range and those bars are still real data.
    pub fn is_valid(&self) -> bool {
        !self.is_void()
            && self.open > 0.0
            && self.high > 0.0
            && self.low > 0.0
            && self.close > 0.0
    }
}

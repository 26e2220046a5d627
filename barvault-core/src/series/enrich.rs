//! Derived columns computed over the full canonical series.
//!
//! `enrich` is a pure function of the OHLCV columns, so recomputing it on every
//! run never accumulates drift.

use crate::domain::PriceBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A bar plus its derived fields; this is the row written to every series file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// `close[i] / close[i-1] - 1`; `None` on the first bar.
    pub daily_return: Option<f64>,
    /// `ln(volume)`; `None` when volume is zero.
    pub log_volume: Option<f64>,
}

impl EnrichedBar {
    pub fn price_bar(&self) -> PriceBar {
        PriceBar {
            date: self.date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

pub fn enrich(bars: &[PriceBar]) -> Vec<EnrichedBar> {
    let mut prev_close: Option<f64> = None;
    bars.iter()
        .map(|bar| {
            let daily_return = prev_close
                .filter(|prev| *prev != 0.0)
                .map(|prev| bar.close / prev - 1.0);
            prev_close = Some(bar.close);
            EnrichedBar {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                daily_return,
                log_volume: log_volume(bar.volume),
            }
        })
        .collect()
}

fn log_volume(volume: u64) -> Option<f64> {
    (volume > 0).then(|| (volume as f64).ln())
}

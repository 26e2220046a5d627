//! Canonical series — the deduplicated, date-ordered full history of one
//! instrument, and the merge that folds fetched bars into it.

pub mod enrich;
pub mod window;

pub use enrich::{enrich, EnrichedBar};
pub use window::{materialize, WindowView};

use crate::domain::PriceBar;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// All-time bars for one instrument. Invariant: dates strictly ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalSeries {
    bars: Vec<PriceBar>,
}

impl CanonicalSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from bars in any order; on duplicate dates the later element wins.
    pub fn from_bars(bars: impl IntoIterator<Item = PriceBar>) -> Self {
        let mut series = Self::new();
        series.merge(bars);
        series
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Fetch checkpoint: date of the trailing record.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    /// Merge fetched bars by date key. A fetched bar replaces a stored bar on the
    /// same date (restatements, partial intraday bars). Returns how many dates
    /// were added or changed.
    pub fn merge(&mut self, fetched: impl IntoIterator<Item = PriceBar>) -> MergeStats {
        let mut by_date: BTreeMap<NaiveDate, PriceBar> =
            self.bars.drain(..).map(|b| (b.date, b)).collect();

        let mut stats = MergeStats::default();
        for bar in fetched {
            match by_date.insert(bar.date, bar) {
                None => stats.added += 1,
                Some(prev) if prev != bar => stats.replaced += 1,
                Some(_) => stats.unchanged += 1,
            }
        }

        self.bars = by_date.into_values().collect();
        stats
    }

    /// BLAKE3 digest over every bar, used to tell updated series from unchanged ones.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for bar in &self.bars {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Outcome counts of one merge. Counting is per fetched bar, so a bar that
/// appears twice in one fetch is counted twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

impl MergeStats {
    pub fn changed(&self) -> bool {
        self.added + self.replaced > 0
    }
}

//! Window materialization: trailing suffixes of the enriched canonical series.
//!
//! A view borrows from the series it was cut from, so it cannot outlive or
//! drift from it. Windows are rebuilt wholesale after every merge.

use super::enrich::EnrichedBar;
use crate::domain::WindowPolicy;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowView<'a> {
    pub policy: WindowPolicy,
    pub bars: &'a [EnrichedBar],
}

impl<'a> WindowView<'a> {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// True when the series was shorter than the policy asks for.
    pub fn is_partial(&self, series_len: usize) -> bool {
        self.policy
            .bar_count()
            .is_some_and(|n| series_len < n)
    }
}

/// Last N bars for fixed policies, the whole series for `AllTime`. A series
/// shorter than N yields the whole series, unpadded.
pub fn materialize(series: &[EnrichedBar], policy: WindowPolicy) -> WindowView<'_> {
    let start = policy
        .bar_count()
        .map_or(0, |n| series.len().saturating_sub(n));
    WindowView {
        policy,
        bars: &series[start..],
    }
}

/// Every policy in `WindowPolicy::ALL` order.
pub fn materialize_all(series: &[EnrichedBar]) -> Vec<WindowView<'_>> {
    WindowPolicy::ALL
        .into_iter()
        .map(|p| materialize(series, p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceBar;
    use crate::series::enrich;
    use chrono::{Days, NaiveDate};

    fn series(n: usize) -> Vec<EnrichedBar> {
        let start = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
        let bars: Vec<PriceBar> = (0..n)
            .map(|i| PriceBar {
                date: start + Days::new(i as u64),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0 + i as f64 * 0.01,
                volume: 100,
            })
            .collect();
        enrich(&bars)
    }

    #[test]
    fn one_year_of_long_series_is_last_252_in_order() {
        let s = series(3000);
        let view = materialize(&s, WindowPolicy::OneYear);
        assert_eq!(view.len(), 252);
        assert_eq!(view.bars, &s[3000 - 252..]);
        assert!(view.bars.windows(2).all(|w| w[0].date < w[1].date));
        assert!(!view.is_partial(s.len()));
    }

    #[test]
    fn short_series_is_returned_whole() {
        let s = series(100);
        let view = materialize(&s, WindowPolicy::TenYear);
        assert_eq!(view.len(), 100);
        assert!(view.is_partial(s.len()));
    }

    #[test]
    fn alltime_is_whole_series() {
        let s = series(3000);
        assert_eq!(materialize(&s, WindowPolicy::AllTime).len(), 3000);
    }

    #[test]
    fn all_policies_in_order() {
        let s = series(1500);
        let lens: Vec<usize> = materialize_all(&s).iter().map(|v| v.len()).collect();
        assert_eq!(lens, vec![252, 1260, 1500, 1500]);
    }
}

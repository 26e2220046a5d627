//! Layout organizer — where every file of the output tree lives, and the
//! write order for one instrument.
//!
//! ```text
//! {root}/STOCKS/{1yr,5yr,10yr,alltime}/{symbol}.csv
//! {root}/ETFS/{1yr,5yr,10yr,alltime}/{symbol}.csv
//! {root}/SECTORS/{sector}/{symbol}.csv
//! {root}/registry.json
//! {root}/reports/last_run.json
//! ```
//!
//! The `alltime` file is the canonical series; every other file is derived
//! from it and rebuilt on each run.

use barvault_core::domain::{AssetType, Sector, WindowPolicy};
use barvault_core::series::{materialize, CanonicalSeries, EnrichedBar};
use barvault_core::store::{self, StoreError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SECTORS_DIR: &str = "SECTORS";

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    parquet_mirror: bool,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, parquet_mirror: bool) -> Self {
        Self {
            root: root.into(),
            parquet_mirror,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn window_dir(&self, asset_type: AssetType, window: WindowPolicy) -> PathBuf {
        self.root.join(asset_type.root_dir()).join(window.dir_name())
    }

    pub fn series_path(
        &self,
        asset_type: AssetType,
        window: WindowPolicy,
        symbol: &str,
    ) -> PathBuf {
        self.window_dir(asset_type, window).join(file_name(symbol))
    }

    pub fn canonical_path(&self, asset_type: AssetType, symbol: &str) -> PathBuf {
        self.series_path(asset_type, WindowPolicy::AllTime, symbol)
    }

    pub fn sector_dir(&self, sector: Sector) -> PathBuf {
        self.root.join(SECTORS_DIR).join(sector.dir_name())
    }

    pub fn sector_path(&self, sector: Sector, symbol: &str) -> PathBuf {
        self.sector_dir(sector).join(file_name(symbol))
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join("registry.json")
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join("reports").join("last_run.json")
    }

    /// Load the canonical series, looking under the instrument's own asset root
    /// first and the other root second (asset type changed since the last run).
    ///
    /// A corrupt file is quarantined and the series treated as absent, so the
    /// next fetch rebuilds it from full history rather than from a stale copy
    /// under the other root.
    pub fn load_canonical(
        &self,
        asset_type: AssetType,
        symbol: &str,
    ) -> Result<Option<CanonicalSeries>, StoreError> {
        for root in [asset_type, asset_type.other()] {
            let path = self.canonical_path(root, symbol);
            match store::read_series(&path) {
                Ok(Some(series)) => {
                    if root != asset_type {
                        tracing::info!(
                            %symbol,
                            from = %root,
                            to = %asset_type,
                            "asset type changed; seeding from previous root"
                        );
                    }
                    return Ok(Some(series));
                }
                Ok(None) => continue,
                Err(StoreError::Corrupt { reason, .. }) => {
                    tracing::warn!(
                        %symbol,
                        path = %path.display(),
                        %reason,
                        "corrupt canonical series"
                    );
                    store::quarantine(&path)?;
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Write every window of one instrument plus its sector mirror.
    ///
    /// Order: `alltime` first (it is the checkpoint for the next run), then the
    /// shorter windows, then the sector mirror. Mirrors of the same symbol under
    /// other sectors are removed afterwards.
    pub fn write_instrument(
        &self,
        asset_type: AssetType,
        symbol: &str,
        rows: &[EnrichedBar],
        sector: Sector,
        sector_window: WindowPolicy,
    ) -> Result<(), StoreError> {
        let order = std::iter::once(WindowPolicy::AllTime)
            .chain(WindowPolicy::ALL.into_iter().filter(|w| *w != WindowPolicy::AllTime));
        for window in order {
            let view = materialize(rows, window);
            self.write_file(&self.series_path(asset_type, window, symbol), view.bars)?;
        }

        let mirror = materialize(rows, sector_window);
        self.write_file(&self.sector_path(sector, symbol), mirror.bars)?;
        self.remove_stale_mirrors(symbol, sector)
    }

    fn write_file(&self, csv_path: &Path, rows: &[EnrichedBar]) -> Result<(), StoreError> {
        store::write_series_csv(csv_path, rows)?;
        if self.parquet_mirror {
            store::write_series_parquet(&csv_path.with_extension("parquet"), rows)?;
        }
        Ok(())
    }

    fn remove_stale_mirrors(&self, symbol: &str, keep: Sector) -> Result<(), StoreError> {
        for sector in Sector::ALL.into_iter().filter(|s| *s != keep) {
            let csv = self.sector_path(sector, symbol);
            for path in [csv.with_extension("parquet"), csv] {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        tracing::debug!(%symbol, from = %sector, "removed stale sector mirror")
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(source) => return Err(StoreError::Io { path, source }),
                }
            }
        }
        Ok(())
    }

    /// CSV file counts across the tree, for `barvault status`.
    pub fn file_counts(&self) -> LayoutCounts {
        let mut counts = LayoutCounts::default();
        for asset_type in AssetType::ALL {
            for window in WindowPolicy::ALL {
                let n = count_csv(&self.window_dir(asset_type, window));
                counts
                    .windows
                    .insert(format!("{}/{}", asset_type.root_dir(), window.dir_name()), n);
            }
        }
        for sector in Sector::ALL {
            let n = count_csv(&self.sector_dir(sector));
            if n > 0 {
                counts.sectors.insert(sector.dir_name().to_string(), n);
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutCounts {
    /// Keyed `STOCKS/1yr` etc.
    pub windows: BTreeMap<String, usize>,
    pub sectors: BTreeMap<String, usize>,
}

/// Path separators in a symbol would escape the window directory.
fn file_name(symbol: &str) -> String {
    let safe: String = symbol
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{safe}.csv")
}

fn count_csv(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "csv"))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use barvault_core::domain::PriceBar;
    use barvault_core::series::enrich;
    use chrono::{Days, NaiveDate};

    fn rows(n: usize) -> Vec<EnrichedBar> {
        let start = NaiveDate::from_ymd_opt(2010, 1, 4).unwrap();
        let bars: Vec<PriceBar> = (0..n)
            .map(|i| PriceBar {
                date: start + Days::new(i as u64),
                open: 20.0,
                high: 21.0,
                low: 19.0,
                close: 20.0 + (i % 7) as f64 * 0.1,
                volume: 500 + i as u64,
            })
            .collect();
        enrich(&bars)
    }

    #[test]
    fn paths() {
        let layout = Layout::new("/data", false);
        assert_eq!(
            layout.series_path(AssetType::Etf, WindowPolicy::FiveYear, "SPY"),
            PathBuf::from("/data/ETFS/5yr/SPY.csv")
        );
        assert_eq!(
            layout.sector_path(Sector::InformationTechnology, "AAPL"),
            PathBuf::from("/data/SECTORS/Information_Technology/AAPL.csv")
        );
        assert_eq!(
            layout.canonical_path(AssetType::Stock, "BRK.B"),
            PathBuf::from("/data/STOCKS/alltime/BRK.B.csv")
        );
        assert_eq!(file_name("A/B"), "A_B.csv");
    }

    #[test]
    fn writes_all_windows_and_sector_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), false);
        let rows = rows(300);
        layout
            .write_instrument(
                AssetType::Stock,
                "AAPL",
                &rows,
                Sector::InformationTechnology,
                WindowPolicy::AllTime,
            )
            .unwrap();

        let one_year = store::read_series(&layout.series_path(
            AssetType::Stock,
            WindowPolicy::OneYear,
            "AAPL",
        ))
        .unwrap()
        .unwrap();
        assert_eq!(one_year.len(), 252);
        let alltime = layout.load_canonical(AssetType::Stock, "AAPL").unwrap().unwrap();
        assert_eq!(alltime.len(), 300);
        assert!(layout
            .sector_path(Sector::InformationTechnology, "AAPL")
            .exists());

        let counts = layout.file_counts();
        assert_eq!(counts.windows["STOCKS/1yr"], 1);
        assert_eq!(counts.windows["ETFS/alltime"], 0);
        assert_eq!(counts.sectors["Information_Technology"], 1);
    }

    #[test]
    fn sector_change_removes_old_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), false);
        let rows = rows(10);
        for sector in [Sector::Unclassified, Sector::Energy] {
            layout
                .write_instrument(AssetType::Stock, "XYZ", &rows, sector, WindowPolicy::AllTime)
                .unwrap();
        }
        assert!(!layout.sector_path(Sector::Unclassified, "XYZ").exists());
        assert!(layout.sector_path(Sector::Energy, "XYZ").exists());
    }

    #[test]
    fn sector_window_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), false);
        let rows = rows(400);
        layout
            .write_instrument(
                AssetType::Etf,
                "SPY",
                &rows,
                Sector::Unclassified,
                WindowPolicy::OneYear,
            )
            .unwrap();
        let mirror = store::read_series(&layout.sector_path(Sector::Unclassified, "SPY"))
            .unwrap()
            .unwrap();
        assert_eq!(mirror.len(), 252);
    }

    #[test]
    fn parquet_companions_follow_csvs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), true);
        let rows = rows(5);
        layout
            .write_instrument(
                AssetType::Etf,
                "QQQ",
                &rows,
                Sector::Unclassified,
                WindowPolicy::AllTime,
            )
            .unwrap();
        assert!(dir.path().join("ETFS/10yr/QQQ.parquet").exists());
        assert!(dir.path().join("SECTORS/Unclassified/QQQ.parquet").exists());
        assert_eq!(layout.file_counts().windows["ETFS/10yr"], 1);
    }

    #[test]
    fn falls_back_to_other_asset_root() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), false);
        let path = layout.canonical_path(AssetType::Stock, "ABC");
        store::write_series_csv(&path, &rows(3)).unwrap();
        let series = layout.load_canonical(AssetType::Etf, "ABC").unwrap().unwrap();
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn corrupt_canonical_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), false);
        let path = layout.canonical_path(AssetType::Stock, "BAD");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not,a,series\n1,2,3\n").unwrap();

        assert!(layout.load_canonical(AssetType::Stock, "BAD").unwrap().is_none());
        assert!(!path.exists());
        assert!(path.with_file_name("BAD.csv.quarantined").exists());
    }

    #[test]
    fn corrupt_own_root_does_not_seed_from_other_root() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), false);
        let stale = layout.canonical_path(AssetType::Stock, "MIX");
        store::write_series_csv(&stale, &rows(3)).unwrap();
        let own = layout.canonical_path(AssetType::Etf, "MIX");
        fs::create_dir_all(own.parent().unwrap()).unwrap();
        fs::write(&own, "garbage\n").unwrap();

        assert!(layout.load_canonical(AssetType::Etf, "MIX").unwrap().is_none());
        assert!(own.with_file_name("MIX.csv.quarantined").exists());
        assert!(stale.exists());
    }
}

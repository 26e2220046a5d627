//! End-of-run summary, persisted as `{root}/reports/last_run.json`.

use crate::pipeline::{SymbolOutcome, SymbolStatus};
use crate::registry::ReconcileStats;
use barvault_core::data::Universe;
use barvault_core::domain::{AssetType, Sector};
use barvault_core::store::{self, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_secs: f64,

    pub universe_size: usize,
    pub universe_stocks: usize,
    pub universe_etfs: usize,
    pub malformed_rows: usize,
    pub excluded_by_name: usize,
    pub added: usize,
    pub deactivated: usize,
    pub reactivated: usize,

    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub delisted: usize,
    pub unclassified: usize,
    pub cancelled: usize,
    /// Symbols whose sector came from the fallback because the lookup failed.
    pub classification_fallbacks: usize,
    pub rejected_rows: usize,

    pub by_sector: BTreeMap<String, usize>,
    pub failures: Vec<SymbolFailure>,
    pub delisted_symbols: Vec<String>,
    pub warnings: Vec<String>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>, universe: &Universe, reconcile: ReconcileStats) -> Self {
        Self {
            started_at,
            finished_at: None,
            elapsed_secs: 0.0,
            universe_size: universe.len(),
            universe_stocks: universe.count(AssetType::Stock),
            universe_etfs: universe.count(AssetType::Etf),
            malformed_rows: universe.malformed_rows,
            excluded_by_name: universe.excluded_by_name,
            added: reconcile.added,
            deactivated: reconcile.deactivated,
            reactivated: reconcile.reactivated,
            updated: 0,
            unchanged: 0,
            failed: 0,
            delisted: 0,
            unclassified: 0,
            cancelled: 0,
            classification_fallbacks: 0,
            rejected_rows: 0,
            by_sector: BTreeMap::new(),
            failures: Vec::new(),
            delisted_symbols: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: &SymbolOutcome) {
        match &outcome.status {
            SymbolStatus::Updated { .. } => self.updated += 1,
            SymbolStatus::Unchanged => self.unchanged += 1,
            SymbolStatus::Delisted => {
                self.delisted += 1;
                self.delisted_symbols.push(outcome.symbol.clone());
            }
            SymbolStatus::FetchFailed(reason) | SymbolStatus::WriteFailed(reason) => {
                self.failed += 1;
                self.failures.push(SymbolFailure {
                    symbol: outcome.symbol.clone(),
                    reason: reason.clone(),
                });
            }
            SymbolStatus::Cancelled => self.cancelled += 1,
        }
        self.rejected_rows += outcome.rejected_rows;
        if outcome.classification_fallback {
            self.classification_fallbacks += 1;
        }
        if let Some(assignment) = &outcome.assignment {
            if assignment.sector == Sector::Unclassified {
                self.unclassified += 1;
            }
            *self
                .by_sector
                .entry(assignment.sector.dir_name().to_string())
                .or_default() += 1;
        }
    }

    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.elapsed_secs = (finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.finished_at = Some(finished_at);
    }

    /// Symbols that reached a terminal state other than cancelled.
    pub fn processed(&self) -> usize {
        self.updated + self.unchanged + self.failed + self.delisted
    }

    pub fn write(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("summary serialization: {e}"),
        })?;
        store::write_atomic(path, |file| {
            use std::io::Write;
            file.write_all(&json).map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        })
    }

    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barvault_core::domain::SectorAssignment;

    fn outcome(symbol: &str, status: SymbolStatus, sector: Sector) -> SymbolOutcome {
        SymbolOutcome {
            symbol: symbol.into(),
            asset_type: AssetType::Stock,
            status,
            assignment: Some(SectorAssignment {
                symbol: symbol.into(),
                industry_code: None,
                sector,
            }),
            classification_fallback: false,
            series_hash: None,
            last_bar_date: None,
            bar_count: 0,
            rejected_rows: 1,
        }
    }

    #[test]
    fn counts_every_status() {
        let mut s = RunSummary::new(Utc::now(), &Universe::default(), ReconcileStats::default());
        s.record(&outcome("A", SymbolStatus::Updated { added: 3, replaced: 1 }, Sector::Energy));
        s.record(&outcome("B", SymbolStatus::Unchanged, Sector::Unclassified));
        s.record(&outcome("C", SymbolStatus::Delisted, Sector::Unclassified));
        s.record(&outcome("D", SymbolStatus::FetchFailed("503".into()), Sector::Energy));
        let mut cancelled = outcome("E", SymbolStatus::Cancelled, Sector::Energy);
        cancelled.assignment = None;
        s.record(&cancelled);

        assert_eq!(
            (s.updated, s.unchanged, s.delisted, s.failed, s.cancelled),
            (1, 1, 1, 1, 1)
        );
        assert_eq!(s.unclassified, 2);
        assert_eq!(s.by_sector["Energy"], 2);
        assert_eq!(s.failures[0].symbol, "D");
        assert_eq!(s.delisted_symbols, vec!["C"]);
        assert_eq!(s.processed(), 4);
        assert_eq!(s.rejected_rows, 5);
    }

    #[test]
    fn report_is_written_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("last_run.json");
        let mut s = RunSummary::new(Utc::now(), &Universe::default(), ReconcileStats::default());
        s.finish(Utc::now());
        s.write(&path).unwrap();
        let loaded = RunSummary::load(&path).unwrap();
        assert_eq!(loaded.updated, 0);
        assert!(loaded.finished_at.is_some());
    }
}

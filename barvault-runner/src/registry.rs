//! Instrument registry — the durable per-symbol state carried between runs.
//!
//! Persisted as `{root}/registry.json`. Holds what the CSV tree cannot: whether
//! a symbol is still listed, whether it was found delisted, its last sector
//! assignment (the fallback when classification is unavailable), and the
//! content hash used to tell updated series from unchanged ones.

use crate::pipeline::{SymbolOutcome, SymbolStatus};
use barvault_core::data::Universe;
use barvault_core::domain::{AssetType, Exchange, Instrument, Sector, SectorAssignment};
use barvault_core::store::{self, StoreError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub asset_type: AssetType,
    pub exchange: Exchange,
    /// Present in the most recent universe snapshot.
    #[serde(default)]
    pub listed: bool,
    /// Listed and not delisted; only active instruments are processed.
    pub active: bool,
    /// The price source reported the symbol as not found. Not retried until the
    /// symbol drops out of the universe and comes back.
    pub delisted: bool,
    pub sector: Sector,
    pub industry_code: Option<String>,
    pub series_hash: Option<String>,
    pub last_bar_date: Option<NaiveDate>,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
}

impl RegistryEntry {
    pub fn assignment(&self, symbol: &str) -> SectorAssignment {
        SectorAssignment {
            symbol: symbol.to_string(),
            industry_code: self.industry_code.clone(),
            sector: self.sector,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    pub instruments: BTreeMap<String, RegistryEntry>,
}

/// What changed when a universe snapshot was folded into the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub added: usize,
    pub deactivated: usize,
    pub reactivated: usize,
    pub asset_type_changed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryTotals {
    pub instruments: usize,
    pub active: usize,
    pub delisted: usize,
    pub by_sector: BTreeMap<String, usize>,
}

impl Registry {
    /// Missing file is an empty registry. An unparseable file is quarantined and
    /// replaced by an empty registry; every series then counts as updated once.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        match serde_json::from_str(&content) {
            Ok(registry) => Ok(registry),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable registry, starting fresh"
                );
                store::quarantine(path)?;
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("registry serialization: {e}"),
        })?;
        store::write_atomic(path, |file| {
            use std::io::Write;
            file.write_all(&json).map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        })
    }

    pub fn get(&self, symbol: &str) -> Option<&RegistryEntry> {
        self.instruments.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Fold a universe snapshot in. Symbols in the snapshot become active unless
    /// delisted; a delisted symbol stays inactive while it keeps being listed and
    /// loses the flag only when it returns after an absence. Symbols absent from
    /// the snapshot become inactive. The snapshot's asset type and metadata win.
    pub fn reconcile(&mut self, universe: &Universe, today: NaiveDate) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let listed: HashSet<&str> = universe
            .instruments
            .iter()
            .map(|i| i.symbol.as_str())
            .collect();

        for instrument in &universe.instruments {
            match self.instruments.get_mut(&instrument.symbol) {
                Some(entry) => {
                    if !entry.listed {
                        entry.delisted = false;
                    }
                    entry.listed = true;
                    if !entry.active && !entry.delisted {
                        stats.reactivated += 1;
                        entry.active = true;
                    }
                    if entry.asset_type != instrument.asset_type {
                        stats.asset_type_changed += 1;
                        tracing::info!(
                            symbol = %instrument.symbol,
                            from = %entry.asset_type,
                            to = %instrument.asset_type,
                            "asset type changed"
                        );
                        entry.asset_type = instrument.asset_type;
                    }
                    entry.name = instrument.name.clone();
                    entry.exchange = instrument.exchange.clone();
                    entry.last_seen = today;
                }
                None => {
                    stats.added += 1;
                    self.instruments.insert(
                        instrument.symbol.clone(),
                        RegistryEntry {
                            name: instrument.name.clone(),
                            asset_type: instrument.asset_type,
                            exchange: instrument.exchange.clone(),
                            listed: true,
                            active: true,
                            delisted: false,
                            sector: Sector::Unclassified,
                            industry_code: None,
                            series_hash: None,
                            last_bar_date: None,
                            first_seen: today,
                            last_seen: today,
                        },
                    );
                }
            }
        }

        for (symbol, entry) in self.instruments.iter_mut() {
            if listed.contains(symbol.as_str()) {
                continue;
            }
            entry.listed = false;
            if entry.active {
                entry.active = false;
                stats.deactivated += 1;
            }
        }
        stats
    }

    /// Instruments to process this run: active and not delisted, symbol order.
    pub fn targets(&self) -> Vec<Instrument> {
        self.instruments
            .iter()
            .filter(|(_, e)| e.active)
            .map(|(symbol, e)| {
                Instrument::new(symbol.as_str(), e.name.as_str(), e.asset_type, e.exchange.clone())
            })
            .collect()
    }

    /// Record one symbol's outcome.
    pub fn apply(&mut self, outcome: &SymbolOutcome) {
        let Some(entry) = self.instruments.get_mut(&outcome.symbol) else {
            return;
        };
        if let Some(assignment) = &outcome.assignment {
            entry.sector = assignment.sector;
            entry.industry_code = assignment.industry_code.clone();
        }
        match &outcome.status {
            SymbolStatus::Updated { .. } | SymbolStatus::Unchanged => {
                entry.series_hash = outcome.series_hash.clone();
                entry.last_bar_date = outcome.last_bar_date;
            }
            SymbolStatus::Delisted => {
                entry.delisted = true;
                entry.active = false;
            }
            SymbolStatus::FetchFailed(_)
            | SymbolStatus::WriteFailed(_)
            | SymbolStatus::Cancelled => {}
        }
    }

    pub fn totals(&self) -> RegistryTotals {
        let mut totals = RegistryTotals {
            instruments: self.instruments.len(),
            ..Default::default()
        };
        for entry in self.instruments.values() {
            if entry.active {
                totals.active += 1;
            }
            if entry.delisted {
                totals.delisted += 1;
            }
            *totals
                .by_sector
                .entry(entry.sector.dir_name().to_string())
                .or_default() += 1;
        }
        totals
    }
}

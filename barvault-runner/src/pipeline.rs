//! Pipeline coordinator — one run over the whole universe.
//!
//! Stages per run: resolve the universe (fatal on failure), reconcile the
//! registry, fan the target instruments out over a bounded rayon pool, then
//! fold the per-symbol outcomes into the registry and the run summary. Worker
//! tasks share nothing mutable; each returns a `SymbolOutcome`.
//!
//! Stages per symbol, strictly in order: classify, load canonical series,
//! incremental fetch, merge, enrich, materialize and write windows.

use crate::config::PipelineConfig;
use crate::layout::Layout;
use crate::registry::{ReconcileStats, Registry};
use crate::summary::RunSummary;
use barvault_core::classify::{ClassifyError, SectorClassifier};
use barvault_core::data::{
    DataError, IncrementalFetcher, ListingSource, PriceSource, RetryPolicy, Universe,
    UniverseError, UniverseResolver,
};
use barvault_core::domain::{AssetType, Instrument, SectorAssignment, WindowPolicy};
use barvault_core::series::{enrich, CanonicalSeries};
use barvault_core::store::StoreError;
use chrono::{NaiveDate, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    UniverseUnavailable(#[from] UniverseError),

    #[error("registry unavailable: {0}")]
    Registry(#[source] StoreError),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// Terminal state of one symbol in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SymbolStatus {
    /// New or restated bars were merged.
    Updated { added: usize, replaced: usize },
    /// Canonical series content identical to the previous run.
    Unchanged,
    /// The price source does not know the symbol.
    Delisted,
    /// Retries exhausted, circuit breaker open, or nothing to build a series from.
    FetchFailed(String),
    /// A series file could not be read or written.
    WriteFailed(String),
    /// The run was cancelled before this symbol started.
    Cancelled,
}

impl SymbolStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, SymbolStatus::FetchFailed(_) | SymbolStatus::WriteFailed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SymbolStatus::Updated { .. } => "updated",
            SymbolStatus::Unchanged => "unchanged",
            SymbolStatus::Delisted => "delisted",
            SymbolStatus::FetchFailed(_) => "fetch failed",
            SymbolStatus::WriteFailed(_) => "write failed",
            SymbolStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub asset_type: AssetType,
    pub status: SymbolStatus,
    /// `None` only when the symbol never started (cancelled).
    pub assignment: Option<SectorAssignment>,
    /// The classifier failed and the assignment came from the registry or the default.
    pub classification_fallback: bool,
    pub series_hash: Option<String>,
    pub last_bar_date: Option<NaiveDate>,
    pub bar_count: usize,
    pub rejected_rows: usize,
}

impl SymbolOutcome {
    fn new(instrument: &Instrument, status: SymbolStatus) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            asset_type: instrument.asset_type,
            status,
            assignment: None,
            classification_fallback: false,
            series_hash: None,
            last_bar_date: None,
            bar_count: 0,
            rejected_rows: 0,
        }
    }
}

/// Progress callback for a run. Called from worker threads.
pub trait RunProgress: Send + Sync {
    /// Called once the universe is resolved and the registry reconciled.
    fn on_universe(&self, universe: &Universe, reconcile: &ReconcileStats, targets: usize);

    /// Called when a symbol reaches its terminal state. `completed` counts
    /// finished symbols including this one, in completion order.
    fn on_symbol_complete(&self, outcome: &SymbolOutcome, completed: usize, total: usize);

    /// Called when the run is done.
    fn on_run_complete(&self, summary: &RunSummary);
}

/// Prints one line per symbol to stdout.
pub struct StdoutProgress;

impl RunProgress for StdoutProgress {
    fn on_universe(&self, universe: &Universe, reconcile: &ReconcileStats, targets: usize) {
        println!(
            "Universe: {} instruments ({} stocks, {} ETFs); {} new, {} dropped, {} relisted",
            universe.len(),
            universe.count(AssetType::Stock),
            universe.count(AssetType::Etf),
            reconcile.added,
            reconcile.deactivated,
            reconcile.reactivated,
        );
        println!("Processing {targets} instruments\n");
    }

    fn on_symbol_complete(&self, outcome: &SymbolOutcome, completed: usize, total: usize) {
        match &outcome.status {
            SymbolStatus::FetchFailed(reason) | SymbolStatus::WriteFailed(reason) => {
                println!("[{completed}/{total}] FAIL {}: {reason}", outcome.symbol)
            }
            SymbolStatus::Cancelled => {}
            status => println!("[{completed}/{total}] {} {}", outcome.symbol, status.label()),
        }
    }

    fn on_run_complete(&self, summary: &RunSummary) {
        println!(
            "\nRun complete: {} updated, {} unchanged, {} failed, {} delisted, \
             {} unclassified, {} cancelled",
            summary.updated,
            summary.unchanged,
            summary.failed,
            summary.delisted,
            summary.unclassified,
            summary.cancelled
        );
    }
}

/// Reports nothing. For tests and embedding.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn on_universe(&self, _: &Universe, _: &ReconcileStats, _: usize) {}
    fn on_symbol_complete(&self, _: &SymbolOutcome, _: usize, _: usize) {}
    fn on_run_complete(&self, _: &RunSummary) {}
}

/// External collaborators of a run.
pub struct Sources<'a> {
    pub listing: &'a dyn ListingSource,
    pub prices: &'a dyn PriceSource,
    pub classifier: &'a SectorClassifier,
}

/// Per-symbol context shared read-only by every worker.
struct SymbolContext<'a> {
    layout: &'a Layout,
    prices: &'a dyn PriceSource,
    classifier: &'a SectorClassifier,
    retry: RetryPolicy,
    sector_window: WindowPolicy,
}

/// Run the pipeline once.
///
/// Only universe resolution, registry loading, and pool construction are
/// fatal. Every per-symbol failure is recorded in the summary and the run
/// carries on. Setting `cancel` stops new symbols from starting; symbols in
/// flight finish their writes.
pub fn run_pipeline(
    config: &PipelineConfig,
    sources: &Sources<'_>,
    cancel: &AtomicBool,
    progress: &dyn RunProgress,
) -> Result<RunSummary, PipelineError> {
    let started_at = Utc::now();
    let layout = Layout::new(&config.output_dir, config.parquet_mirror);

    let resolver = UniverseResolver::new(config.universe.exclude_name_patterns.iter().cloned());
    let universe = resolver.resolve(sources.listing)?;

    let registry_path = layout.registry_path();
    let mut registry = Registry::load(&registry_path).map_err(PipelineError::Registry)?;
    let reconcile = registry.reconcile(&universe, started_at.date_naive());
    let targets = registry.targets();
    tracing::info!(
        targets = targets.len(),
        added = reconcile.added,
        deactivated = reconcile.deactivated,
        reactivated = reconcile.reactivated,
        "registry reconciled"
    );
    progress.on_universe(&universe, &reconcile, targets.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.concurrency)
        .thread_name(|i| format!("barvault-worker-{i}"))
        .build()
        .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;

    let ctx = SymbolContext {
        layout: &layout,
        prices: sources.prices,
        classifier: sources.classifier,
        retry: config.fetch.retry_policy(),
        sector_window: config.sector_window,
    };
    let total = targets.len();
    let completed = AtomicUsize::new(0);
    let snapshot = &registry;

    let outcomes: Vec<SymbolOutcome> = pool.install(|| {
        targets
            .par_iter()
            .map(|instrument| {
                let outcome = if cancel.load(Ordering::Relaxed) {
                    SymbolOutcome::new(instrument, SymbolStatus::Cancelled)
                } else {
                    let prior = snapshot.get(&instrument.symbol);
                    process_symbol(
                        &ctx,
                        instrument,
                        prior.map(|e| e.assignment(&instrument.symbol)),
                        prior.and_then(|e| e.series_hash.as_deref()),
                    )
                };
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                progress.on_symbol_complete(&outcome, done, total);
                outcome
            })
            .collect()
    });

    let mut summary = RunSummary::new(started_at, &universe, reconcile);
    for outcome in &outcomes {
        registry.apply(outcome);
        summary.record(outcome);
    }
    summary.finish(Utc::now());

    if let Err(e) = registry.save(&registry_path) {
        tracing::error!(error = %e, "failed to save registry");
        summary.warnings.push(format!("registry not saved: {e}"));
    }
    if let Err(e) = summary.write(&layout.report_path()) {
        tracing::error!(error = %e, "failed to write run report");
    }
    tracing::info!(
        updated = summary.updated,
        unchanged = summary.unchanged,
        failed = summary.failed,
        delisted = summary.delisted,
        unclassified = summary.unclassified,
        cancelled = summary.cancelled,
        elapsed_secs = summary.elapsed_secs,
        "run complete"
    );
    progress.on_run_complete(&summary);
    Ok(summary)
}

fn process_symbol(
    ctx: &SymbolContext<'_>,
    instrument: &Instrument,
    prior_assignment: Option<SectorAssignment>,
    prior_hash: Option<&str>,
) -> SymbolOutcome {
    let symbol = instrument.symbol.as_str();
    let mut outcome = SymbolOutcome::new(instrument, SymbolStatus::Unchanged);

    let (assignment, fallback) = classify(ctx.classifier, symbol, prior_assignment);
    let sector = assignment.sector;
    outcome.assignment = Some(assignment);
    outcome.classification_fallback = fallback;

    let existing = match ctx.layout.load_canonical(instrument.asset_type, symbol) {
        Ok(series) => series.unwrap_or_default(),
        Err(e) => {
            tracing::error!(%symbol, error = %e, "failed to read canonical series");
            outcome.status = SymbolStatus::WriteFailed(e.to_string());
            return outcome;
        }
    };

    let fetcher = IncrementalFetcher::new(ctx.prices, ctx.retry.clone());
    let fetched = match fetcher.fetch(&instrument.provider_symbol(), existing.last_date()) {
        Ok(f) => f,
        Err(DataError::SymbolNotFound { .. }) => {
            tracing::info!(%symbol, "symbol not found at price source, marking delisted");
            outcome.status = SymbolStatus::Delisted;
            return outcome;
        }
        Err(e) => {
            tracing::warn!(%symbol, error = %e, "fetch failed");
            outcome.status = SymbolStatus::FetchFailed(e.to_string());
            return outcome;
        }
    };
    outcome.rejected_rows = fetched.rejected.len();

    if existing.is_empty() && fetched.bars.is_empty() {
        outcome.status = SymbolStatus::FetchFailed("no bars available".into());
        return outcome;
    }

    let mut series: CanonicalSeries = existing;
    let stats = series.merge(fetched.bars);
    let rows = enrich(series.bars());

    if let Err(e) = ctx.layout.write_instrument(
        instrument.asset_type,
        symbol,
        &rows,
        sector,
        ctx.sector_window,
    ) {
        tracing::error!(%symbol, error = %e, "failed to write series");
        outcome.status = SymbolStatus::WriteFailed(e.to_string());
        return outcome;
    }

    let hash = series.content_hash();
    outcome.status = if prior_hash == Some(hash.as_str()) {
        SymbolStatus::Unchanged
    } else {
        SymbolStatus::Updated {
            added: stats.added,
            replaced: stats.replaced,
        }
    };
    tracing::debug!(
        %symbol,
        status = outcome.status.label(),
        bars = series.len(),
        added = stats.added,
        replaced = stats.replaced,
        "series written"
    );
    outcome.series_hash = Some(hash);
    outcome.last_bar_date = series.last_date();
    outcome.bar_count = series.len();
    outcome
}

/// Classify, falling back to the previous assignment (or `Unclassified`) when
/// the lookup fails. The flag is true when the fallback was used.
fn classify(
    classifier: &SectorClassifier,
    symbol: &str,
    prior: Option<SectorAssignment>,
) -> (SectorAssignment, bool) {
    match classifier.classify(symbol) {
        Ok(assignment) => (assignment, false),
        Err(e) => {
            if !matches!(e, ClassifyError::Disabled) {
                tracing::warn!(
                    %symbol,
                    error = %e,
                    "classification unavailable, keeping previous sector"
                );
            }
            let assignment = prior.unwrap_or_else(|| SectorAssignment::unclassified(symbol));
            (assignment, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barvault_core::classify::IndustryCodeSource;
    use barvault_core::domain::{Exchange, Sector};
    use std::sync::Arc;

    struct Flaky;

    impl IndustryCodeSource for Flaky {
        fn industry_code(&self, _: &str) -> Result<Option<String>, ClassifyError> {
            Err(ClassifyError::Unavailable("EDGAR down".into()))
        }
    }

    #[test]
    fn classification_failure_keeps_prior_assignment() {
        let classifier = SectorClassifier::new(Arc::new(Flaky));
        let prior = SectorAssignment {
            symbol: "XOM".into(),
            industry_code: Some("2911".into()),
            sector: Sector::Energy,
        };
        let (a, fallback) = classify(&classifier, "XOM", Some(prior.clone()));
        assert!(fallback);
        assert_eq!(a, prior);

        let (a, _) = classify(&classifier, "NEW", None);
        assert_eq!(a.sector, Sector::Unclassified);
    }

    #[test]
    fn status_labels_and_failures() {
        assert!(SymbolStatus::FetchFailed("x".into()).is_failure());
        assert!(SymbolStatus::WriteFailed("x".into()).is_failure());
        assert!(!SymbolStatus::Delisted.is_failure());
        assert_eq!(SymbolStatus::Updated { added: 1, replaced: 0 }.label(), "updated");
    }

    #[test]
    fn cancelled_outcome_has_no_assignment() {
        let inst = Instrument::new("SPY", "SPDR", AssetType::Etf, Exchange::NyseArca);
        let o = SymbolOutcome::new(&inst, SymbolStatus::Cancelled);
        assert!(o.assignment.is_none());
        assert_eq!(o.asset_type, AssetType::Etf);
    }
}

//! BarVault Runner — one pipeline run over the listed universe.
//!
//! This crate builds on `barvault-core` to provide:
//! - TOML configuration and logging setup
//! - The output tree layout and per-instrument write order
//! - The instrument registry carried between runs
//! - The bounded worker pool and per-symbol pipeline
//! - The end-of-run summary and JSON report

pub mod config;
pub mod layout;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod summary;

pub use config::{ClassifyConfig, ConfigError, FetchConfig, PipelineConfig, UniverseConfig};
pub use layout::{Layout, LayoutCounts};
pub use logging::LoggingConfig;
pub use pipeline::{
    run_pipeline, PipelineError, RunProgress, SilentProgress, Sources, StdoutProgress,
    SymbolOutcome, SymbolStatus,
};
pub use registry::{ReconcileStats, Registry, RegistryEntry, RegistryTotals};
pub use summary::{RunSummary, SymbolFailure};

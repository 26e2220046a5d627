//! BarVault Core — domain types, data acquisition, series maintenance, sector classification.
//!
//! This crate holds everything that does not need to know about the output tree:
//! - Domain types (bars, instruments, sectors, window policies)
//! - Universe feed parsing and the price source abstraction
//! - Incremental fetch with retry, backoff and a shared circuit breaker
//! - Canonical series merge, derived columns and window materialization
//! - SIC-based sector classification
//! - CSV/Parquet series files with atomic writes

pub mod classify;
pub mod data;
pub mod domain;
pub mod series;
pub mod store;

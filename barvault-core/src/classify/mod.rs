//! Sector classifier — industry code lookup plus the static SIC → sector table.

pub mod edgar;
pub mod sic;

pub use edgar::EdgarClient;
pub use sic::sector_for_code;

use crate::domain::{Sector, SectorAssignment};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classification unavailable: {0}")]
    Unavailable(String),

    #[error("classification disabled")]
    Disabled,
}

/// Regulatory industry-code lookup (SEC SIC in production).
pub trait IndustryCodeSource: Send + Sync {
    /// `Ok(None)` when the symbol is unknown to the registry or carries no code.
    fn industry_code(&self, symbol: &str) -> Result<Option<String>, ClassifyError>;
}

#[derive(Clone)]
pub struct SectorClassifier {
    source: Option<Arc<dyn IndustryCodeSource>>,
}

impl SectorClassifier {
    pub fn new(source: Arc<dyn IndustryCodeSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// Every lookup fails with `ClassifyError::Disabled`, so callers fall back
    /// to whatever assignment they already hold.
    pub fn disabled() -> Self {
        Self { source: None }
    }

    pub fn classify(&self, symbol: &str) -> Result<SectorAssignment, ClassifyError> {
        let source = self.source.as_ref().ok_or(ClassifyError::Disabled)?;
        let Some(code) = source.industry_code(symbol)? else {
            return Ok(SectorAssignment::unclassified(symbol));
        };
        Ok(SectorAssignment {
            symbol: symbol.to_string(),
            sector: sector_for_code(&code),
            industry_code: Some(code),
        })
    }
}

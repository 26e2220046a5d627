//! GICS-style sector buckets and per-symbol sector assignments.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the 11 GICS sectors, or `Unclassified` when no usable industry code exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sector {
    InformationTechnology,
    Healthcare,
    Financials,
    RealEstate,
    CommunicationServices,
    Utilities,
    Energy,
    Materials,
    ConsumerStaples,
    ConsumerDiscretionary,
    Industrials,
    Unclassified,
}

impl Sector {
    pub const ALL: [Sector; 12] = [
        Sector::InformationTechnology,
        Sector::Healthcare,
        Sector::Financials,
        Sector::RealEstate,
        Sector::CommunicationServices,
        Sector::Utilities,
        Sector::Energy,
        Sector::Materials,
        Sector::ConsumerStaples,
        Sector::ConsumerDiscretionary,
        Sector::Industrials,
        Sector::Unclassified,
    ];

    /// Directory name under `SECTORS/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            Sector::InformationTechnology => "Information_Technology",
            Sector::Healthcare => "Healthcare",
            Sector::Financials => "Financials",
            Sector::RealEstate => "Real_Estate",
            Sector::CommunicationServices => "Communication_Services",
            Sector::Utilities => "Utilities",
            Sector::Energy => "Energy",
            Sector::Materials => "Materials",
            Sector::ConsumerStaples => "Consumer_Staples",
            Sector::ConsumerDiscretionary => "Consumer_Discretionary",
            Sector::Industrials => "Industrials",
            Sector::Unclassified => "Unclassified",
        }
    }

    pub fn is_classified(self) -> bool {
        self != Sector::Unclassified
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Result of classifying one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorAssignment {
    pub symbol: String,
    pub industry_code: Option<String>,
    pub sector: Sector,
}

impl SectorAssignment {
    pub fn unclassified(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            industry_code: None,
            sector: Sector::Unclassified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn dir_names_are_unique() {
        let names: HashSet<&str> = Sector::ALL.iter().map(|s| s.dir_name()).collect();
        assert_eq!(names.len(), Sector::ALL.len());
    }

    #[test]
    fn eleven_classified_sectors() {
        assert_eq!(Sector::ALL.iter().filter(|s| s.is_classified()).count(), 11);
    }
}

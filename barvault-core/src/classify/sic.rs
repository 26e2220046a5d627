//! Static SIC code range table.
//!
//! Ranges are inclusive and scanned in order; the first match wins, so the
//! narrow technology and healthcare carve-outs sit ahead of the broad
//! manufacturing and services blocks they overlap.

use crate::domain::Sector;

const SIC_TABLE: &[(u32, u32, Sector)] = &[
    (3570, 3579, Sector::InformationTechnology),
    (3600, 3699, Sector::InformationTechnology),
    (7370, 7379, Sector::InformationTechnology),
    (2830, 2839, Sector::Healthcare),
    (3840, 3849, Sector::Healthcare),
    (8000, 8099, Sector::Healthcare),
    (6500, 6599, Sector::RealEstate),
    (6000, 6799, Sector::Financials),
    (4800, 4899, Sector::CommunicationServices),
    (4900, 4999, Sector::Utilities),
    (1200, 1399, Sector::Energy),
    (2900, 2999, Sector::Energy),
    (1000, 1099, Sector::Materials),
    (1400, 1499, Sector::Materials),
    (2600, 2699, Sector::Materials),
    (2800, 2829, Sector::Materials),
    (3300, 3399, Sector::Materials),
    (2000, 2199, Sector::ConsumerStaples),
    (5100, 5199, Sector::ConsumerStaples),
    (5400, 5499, Sector::ConsumerStaples),
    (1500, 1799, Sector::Industrials),
    (3400, 3599, Sector::Industrials),
    (3700, 3799, Sector::Industrials),
    (4000, 4799, Sector::Industrials),
    (5000, 5099, Sector::Industrials),
    (7200, 7399, Sector::Industrials),
    (2300, 2399, Sector::ConsumerDiscretionary),
    (2500, 2599, Sector::ConsumerDiscretionary),
    (3900, 3999, Sector::ConsumerDiscretionary),
    (5200, 5999, Sector::ConsumerDiscretionary),
    (7000, 7199, Sector::ConsumerDiscretionary),
];

/// Map an industry code to its sector. Total: anything non-numeric or outside
/// every range is `Unclassified`.
pub fn sector_for_code(code: &str) -> Sector {
    let Ok(sic) = code.trim().parse::<u32>() else {
        return Sector::Unclassified;
    };
    SIC_TABLE
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&sic))
        .map_or(Sector::Unclassified, |(_, _, sector)| *sector)
}

//! Rolling window policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trailing-window policy, measured in trading bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowPolicy {
    #[serde(rename = "1yr")]
    OneYear,
    #[serde(rename = "5yr")]
    FiveYear,
    #[serde(rename = "10yr")]
    TenYear,
    #[serde(rename = "alltime")]
    AllTime,
}

impl WindowPolicy {
    pub const ALL: [WindowPolicy; 4] = [
        WindowPolicy::OneYear,
        WindowPolicy::FiveYear,
        WindowPolicy::TenYear,
        WindowPolicy::AllTime,
    ];

    /// Number of trailing bars kept, or `None` for the whole series.
    pub fn bar_count(self) -> Option<usize> {
        match self {
            WindowPolicy::OneYear => Some(252),
            WindowPolicy::FiveYear => Some(1260),
            WindowPolicy::TenYear => Some(2520),
            WindowPolicy::AllTime => None,
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            WindowPolicy::OneYear => "1yr",
            WindowPolicy::FiveYear => "5yr",
            WindowPolicy::TenYear => "10yr",
            WindowPolicy::AllTime => "alltime",
        }
    }
}

impl fmt::Display for WindowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for WindowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindowPolicy::ALL
            .into_iter()
            .find(|w| w.dir_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown window '{s}' (expected 1yr, 5yr, 10yr or alltime)"))
    }
}

//! Universe resolver — parses the NASDAQ Trader `nasdaqtraded.txt` listing feed.
//!
//! The feed is pipe-delimited with a header row and a trailing
//! `File Creation Time: ...` line. Columns are located by header name so
//! column reordering upstream does not silently shift fields.

use crate::domain::{AssetType, Exchange, Instrument};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const NASDAQ_TRADED_URL: &str = "https://www.nasdaqtrader.com/dynamic/SymDir/nasdaqtraded.txt";

/// Security-name fragments that mark a stock listing as something other than
/// common equity.
pub const DEFAULT_EXCLUDED_NAME_PATTERNS: &[&str] = &[
    "- Unit",
    "Warrant",
    " Right",
    "Notes",
    "Subordinated",
    "Preferred",
    "Total Return",
    "consisting",
    "%",
];

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("universe unavailable: {0}")]
    Unavailable(String),
}

/// Where the raw listing text comes from.
pub trait ListingSource: Send + Sync {
    fn describe(&self) -> String;
    fn fetch_listing(&self) -> Result<String, UniverseError>;
}

/// Listing feed over HTTP.
pub struct HttpListingSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpListingSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UniverseError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UniverseError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl ListingSource for HttpListingSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch_listing(&self) -> Result<String, UniverseError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| UniverseError::Unavailable(format!("GET {}: {e}", self.url)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(UniverseError::Unavailable(format!(
                "GET {}: HTTP {status}",
                self.url
            )));
        }
        resp.text()
            .map_err(|e| UniverseError::Unavailable(format!("read body: {e}")))
    }
}

/// Listing feed saved on disk.
pub struct FileListingSource {
    path: PathBuf,
}

impl FileListingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ListingSource for FileListingSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch_listing(&self) -> Result<String, UniverseError> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            UniverseError::Unavailable(format!("read {}: {e}", self.path.display()))
        })
    }
}

/// Result of resolving the universe from one feed snapshot.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub instruments: Vec<Instrument>,
    /// Rows dropped because required fields were missing.
    pub malformed_rows: usize,
    /// Stock rows dropped by the name filter.
    pub excluded_by_name: usize,
}

impl Universe {
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn count(&self, asset_type: AssetType) -> usize {
        self.instruments
            .iter()
            .filter(|i| i.asset_type == asset_type)
            .count()
    }
}

pub struct UniverseResolver {
    excluded_name_patterns: Vec<String>,
}

impl Default for UniverseResolver {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_NAME_PATTERNS.iter().map(|s| s.to_string()))
    }
}

impl UniverseResolver {
    pub fn new(patterns: impl IntoIterator<Item = String>) -> Self {
        Self {
            excluded_name_patterns: patterns
                .into_iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Fetch and parse. Any failure, including a feed with zero usable rows, is
    /// `UniverseError::Unavailable`.
    pub fn resolve(&self, source: &dyn ListingSource) -> Result<Universe, UniverseError> {
        let text = source.fetch_listing()?;
        let universe = self.parse(&text)?;
        tracing::info!(
            source = %source.describe(),
            instruments = universe.len(),
            stocks = universe.count(AssetType::Stock),
            etfs = universe.count(AssetType::Etf),
            malformed = universe.malformed_rows,
            excluded = universe.excluded_by_name,
            "resolved universe"
        );
        Ok(universe)
    }

    pub fn parse(&self, text: &str) -> Result<Universe, UniverseError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'|')
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| UniverseError::Unavailable(format!("unreadable header: {e}")))?
            .clone();
        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

        let symbol_col = column("Symbol")
            .or_else(|| column("NASDAQ Symbol"))
            .ok_or_else(|| UniverseError::Unavailable("feed has no Symbol column".into()))?;
        let name_col = column("Security Name");
        let exchange_col = column("Listing Exchange");
        let etf_col = column("ETF");
        let test_col = column("Test Issue");
        let traded_col = column("Nasdaq Traded");

        let mut universe = Universe::default();
        let mut seen = HashSet::new();

        for record in reader.records() {
            let Ok(record) = record else {
                universe.malformed_rows += 1;
                continue;
            };
            let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

            if field(Some(0)).starts_with("File Creation Time") {
                continue;
            }
            let symbol = field(Some(symbol_col));
            if symbol.is_empty() {
                universe.malformed_rows += 1;
                continue;
            }
            let test_issue = field(test_col).eq_ignore_ascii_case("Y");
            let not_traded = field(traded_col).eq_ignore_ascii_case("N");
            if test_issue || not_traded {
                continue;
            }

            let name = field(name_col);
            let asset_type = if field(etf_col).eq_ignore_ascii_case("Y") {
                AssetType::Etf
            } else {
                AssetType::Stock
            };
            if asset_type == AssetType::Stock && self.is_excluded_name(name) {
                universe.excluded_by_name += 1;
                continue;
            }
            if !seen.insert(symbol.to_string()) {
                continue;
            }

            universe.instruments.push(Instrument::new(
                symbol,
                name,
                asset_type,
                Exchange::from_code(field(exchange_col)),
            ));
        }

        if universe.is_empty() {
            return Err(UniverseError::Unavailable(
                "listing feed produced zero instruments".into(),
            ));
        }
        Ok(universe)
    }

    fn is_excluded_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.excluded_name_patterns
            .iter()
            .any(|p| lower.contains(p.as_str()))
    }
}

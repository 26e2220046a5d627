//! Instrument metadata as resolved from the listing feed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset type inferred from the listing feed's ETF flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Stock,
    Etf,
}

impl AssetType {
    pub const ALL: [AssetType; 2] = [AssetType::Stock, AssetType::Etf];

    /// Top-level directory name in the persisted layout.
    pub fn root_dir(self) -> &'static str {
        match self {
            AssetType::Stock => "STOCKS",
            AssetType::Etf => "ETFS",
        }
    }

    pub fn other(self) -> AssetType {
        match self {
            AssetType::Stock => AssetType::Etf,
            AssetType::Etf => AssetType::Stock,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetType::Stock => write!(f, "stock"),
            AssetType::Etf => write!(f, "etf"),
        }
    }
}

/// Listing venue, from the feed's single-letter `Listing Exchange` code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exchange {
    Nasdaq,
    Nyse,
    NyseAmerican,
    NyseArca,
    Cboe,
    Iex,
    Other(String),
}

impl Exchange {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "Q" => Exchange::Nasdaq,
            "N" => Exchange::Nyse,
            "A" => Exchange::NyseAmerican,
            "P" => Exchange::NyseArca,
            "Z" => Exchange::Cboe,
            "V" => Exchange::Iex,
            other => Exchange::Other(other.to_string()),
        }
    }
}

/// A tradable instrument keyed by symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub asset_type: AssetType,
    pub exchange: Exchange,
    pub active: bool,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        asset_type: AssetType,
        exchange: Exchange,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            asset_type,
            exchange,
            active: true,
        }
    }

    /// Symbol spelling expected by price sources: share-class dots become dashes
    /// (`BRK.B` → `BRK-B`).
    pub fn provider_symbol(&self) -> String {
        provider_symbol(&self.symbol)
    }
}

/// See [`Instrument::provider_symbol`].
pub fn provider_symbol(symbol: &str) -> String {
    symbol.trim().replace(['.', '/'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_codes() {
        assert_eq!(Exchange::from_code("Q"), Exchange::Nasdaq);
        assert_eq!(Exchange::from_code("P"), Exchange::NyseArca);
        assert_eq!(Exchange::from_code("X"), Exchange::Other("X".into()));
    }

    #[test]
    fn provider_symbol_replaces_share_class_separator() {
        let inst = Instrument::new("BRK.B", "Berkshire", AssetType::Stock, Exchange::Nyse);
        assert_eq!(inst.provider_symbol(), "BRK-B");
        assert_eq!(provider_symbol("AAPL"), "AAPL");
    }

    #[test]
    fn asset_roots() {
        assert_eq!(AssetType::Stock.root_dir(), "STOCKS");
        assert_eq!(AssetType::Etf.root_dir(), "ETFS");
        assert_eq!(AssetType::Etf.other(), AssetType::Stock);
    }
}

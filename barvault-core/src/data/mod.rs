//! Data acquisition: listing feed, price source, retries and the incremental fetcher.

pub mod circuit_breaker;
pub mod fetch;
pub mod provider;
pub mod retry;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use fetch::{validate_rows, FetchPlan, FetchedBars, IncrementalFetcher};
pub use provider::{DataError, DataSource, FetchResult, PriceSource, RawBar};
pub use retry::RetryPolicy;
pub use universe::{
    FileListingSource, HttpListingSource, ListingSource, Universe, UniverseError,
    UniverseResolver, DEFAULT_EXCLUDED_NAME_PATTERNS, NASDAQ_TRADED_URL,
};
pub use yahoo::YahooProvider;

//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. CLI flags are applied on top by the binary.

use crate::logging::LoggingConfig;
use barvault_core::data::{
    CircuitBreaker, RetryPolicy, DEFAULT_EXCLUDED_NAME_PATTERNS, NASDAQ_TRADED_URL,
};
use barvault_core::domain::WindowPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root of the output tree (`STOCKS/`, `ETFS/`, `SECTORS/`, registry, reports).
    pub output_dir: PathBuf,
    /// Worker threads; also the cap on concurrent requests to the price source.
    pub concurrency: usize,
    /// Window mirrored into `SECTORS/`.
    pub sector_window: WindowPolicy,
    /// Write a `.parquet` companion next to every CSV.
    pub parquet_mirror: bool,
    pub universe: UniverseConfig,
    pub fetch: FetchConfig,
    pub classify: ClassifyConfig,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            concurrency: 8,
            sector_window: WindowPolicy::AllTime,
            parquet_mirror: false,
            universe: UniverseConfig::default(),
            fetch: FetchConfig::default(),
            classify: ClassifyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniverseConfig {
    pub url: String,
    /// Read the listing from disk instead of `url`.
    pub file: Option<PathBuf>,
    /// Case-insensitive name fragments that drop a stock listing. Empty disables the filter.
    pub exclude_name_patterns: Vec<String>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            url: NASDAQ_TRADED_URL.to_string(),
            file: None,
            exclude_name_patterns: DEFAULT_EXCLUDED_NAME_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_secs: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            timeout_secs: 30,
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: 5,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.base_delay_ms > 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn circuit_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(
            Duration::from_secs(self.breaker_cooldown_secs),
            self.breaker_failure_threshold,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifyConfig {
    pub enabled: bool,
    /// Sent on every EDGAR request. SEC asks for a name and contact address.
    pub user_agent: String,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_agent: concat!("barvault/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "fetch.max_attempts must be at least 1".into(),
            ));
        }
        if self.fetch.base_delay_ms > self.fetch.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "fetch.base_delay_ms ({}) exceeds fetch.max_delay_ms ({})",
                self.fetch.base_delay_ms, self.fetch.max_delay_ms
            )));
        }
        if self.classify.enabled && self.classify.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "classify.user_agent is required when classification is enabled".into(),
            ));
        }
        if self.universe.file.is_none() && self.universe.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "one of universe.url or universe.file is required".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.sector_window, WindowPolicy::AllTime);
        assert!(config.classify.enabled);
    }

    #[test]
    fn parses_full_config() {
        let config = PipelineConfig::from_toml(
            r#"
output_dir = "/srv/bars"
concurrency = 4
sector_window = "5yr"
parquet_mirror = true

[universe]
file = "nasdaqtraded.txt"
exclude_name_patterns = ["Warrant"]

[fetch]
max_attempts = 2
base_delay_ms = 100
max_delay_ms = 1000

[classify]
enabled = true
user_agent = "Jane Analyst jane@example.com"

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/srv/bars"));
        assert_eq!(config.sector_window, WindowPolicy::FiveYear);
        assert_eq!(config.universe.exclude_name_patterns, vec!["Warrant"]);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.retry_policy().max_attempts, 2);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn rejects_invalid_values() {
        for bad in [
            "concurrency = 0",
            "[fetch]\nmax_attempts = 0",
            "[fetch]\nbase_delay_ms = 5000\nmax_delay_ms = 10",
            "[classify]\nuser_agent = \"  \"",
            "[logging]\nformat = \"xml\"",
        ] {
            assert!(
                matches!(PipelineConfig::from_toml(bad), Err(ConfigError::Invalid(_))),
                "accepted: {bad}"
            );
        }
    }

    #[test]
    fn empty_user_agent_is_fine_when_classification_is_off() {
        let toml = "[classify]\nenabled = false\nuser_agent = \"\"";
        assert!(PipelineConfig::from_toml(toml).is_ok());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml("concurrancy = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        assert!(matches!(
            PipelineConfig::from_file(Path::new("/nonexistent/barvault.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}

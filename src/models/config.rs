//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Source;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and probing behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// File locations for state, exports and reference data
    #[serde(default)]
    pub paths: PathsConfig,

    /// Life-stage thresholds
    #[serde(default)]
    pub age: AgeThresholds,

    /// Name cleaning settings
    #[serde(default)]
    pub names: NamesConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if !(self.age.junior_below > 0.0) {
            return Err(AppError::validation("age.junior_below must be > 0"));
        }
        if !(self.age.senior_from > self.age.junior_below) {
            return Err(AppError::validation(
                "age.senior_from must be greater than age.junior_below",
            ));
        }
        Ok(())
    }
}

/// HTTP client and probing behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum delay between two requests to the same source, in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the per-source export logs
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding the crawl state logs
    #[serde(default = "defaults::state_dir")]
    pub state_dir: PathBuf,

    /// SQLite database file
    #[serde(default = "defaults::database")]
    pub database: PathBuf,

    /// Vocabulary word list, one word per line
    #[serde(default = "defaults::vocabulary")]
    pub vocabulary: PathBuf,

    /// Breed mapping table (JSON)
    #[serde(default = "defaults::breed_mapping")]
    pub breed_mapping: PathBuf,
}

impl PathsConfig {
    /// Export log for a source, e.g. `data/spa.jsonl`.
    pub fn export_log(&self, source: Source) -> PathBuf {
        self.data_dir.join(format!("{}.jsonl", source.slug()))
    }

    /// Crawl state directory for a source.
    pub fn state_dir_for(&self, source: Source) -> PathBuf {
        self.state_dir.join(source.slug())
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            state_dir: defaults::state_dir(),
            database: defaults::database(),
            vocabulary: defaults::vocabulary(),
            breed_mapping: defaults::breed_mapping(),
        }
    }
}

/// Half-open life-stage thresholds, in years.
///
/// `age < junior_below` is junior, `age < senior_from` is adult, anything
/// older is senior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeThresholds {
    #[serde(default = "defaults::junior_below")]
    pub junior_below: f64,

    #[serde(default = "defaults::senior_from")]
    pub senior_from: f64,
}

impl Default for AgeThresholds {
    fn default() -> Self {
        Self {
            junior_below: defaults::junior_below(),
            senior_from: defaults::senior_from(),
        }
    }
}

/// Name cleaning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamesConfig {
    /// Organisational acronyms that start a noise suffix
    #[serde(default = "defaults::noise_acronyms")]
    pub noise_acronyms: Vec<String>,
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            noise_acronyms: defaults::noise_acronyms(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; shelters/0.1)".into()
    }
    pub fn timeout() -> u64 {
        3
    }
    pub fn request_delay() -> u64 {
        1000
    }
    pub fn max_concurrent() -> usize {
        1
    }

    // Path defaults
    pub fn data_dir() -> PathBuf {
        "data".into()
    }
    pub fn state_dir() -> PathBuf {
        "cache".into()
    }
    pub fn database() -> PathBuf {
        "data/shelters.db".into()
    }
    pub fn vocabulary() -> PathBuf {
        "data/french_dictionary.txt".into()
    }
    pub fn breed_mapping() -> PathBuf {
        "data/breeds_mapping.json".into()
    }

    // Age defaults
    pub fn junior_below() -> f64 {
        1.0
    }
    pub fn senior_from() -> f64 {
        7.0
    }

    // Name defaults
    pub fn noise_acronyms() -> Vec<String> {
        ["QCN", "VAA", "CAA", "OAA", "PAA", "CHAO", "HAA"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

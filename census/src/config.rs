//! Configuration for the census run
//!
//! Built from CLI flags (each also readable from a `CENSUS_*` env var).

use crate::collector::CollectorConfig;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_NODE: &str = "https://api.bitclout.com";
pub const DEFAULT_BLOCKS_TO_COLLECT: u64 = 1000;
pub const DEFAULT_DELAY_MS: u64 = 1500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusConfig {
    /// CSV destination; nothing is written when unset
    pub output_csv_file: Option<PathBuf>,

    /// Node base URL
    pub node: String,

    /// Start height (None = current tip)
    pub starting_block_height: Option<u64>,

    pub blocks_to_collect: u64,

    /// Pacing and retry delay (milliseconds)
    pub delay_ms: u64,

    /// Give up on a request after this many retries (None = never)
    pub max_retries: Option<u32>,

    pub request_timeout_ms: Option<u64>,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            output_csv_file: None,
            node: DEFAULT_NODE.to_string(),
            starting_block_height: None,
            blocks_to_collect: DEFAULT_BLOCKS_TO_COLLECT,
            delay_ms: DEFAULT_DELAY_MS,
            max_retries: None,
            request_timeout_ms: None,
        }
    }
}

impl CensusConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.node.starts_with("http://") || self.node.starts_with("https://")) {
            anyhow::bail!("Node URL must start with 'http://' or 'https://': {}", self.node);
        }

        if self.blocks_to_collect == 0 {
            anyhow::bail!("blocks_to_collect must be at least 1");
        }

        if self.request_timeout_ms == Some(0) {
            anyhow::bail!("request_timeout_ms must be greater than 0");
        }

        if let Some(path) = &self.output_csv_file {
            check_output_path(path)?;
        }

        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.delay(), self.max_retries)
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            starting_height: self.starting_block_height,
            blocks_to_collect: self.blocks_to_collect,
            retry: self.retry_policy(),
            node: self.node.trim_end_matches('/').to_string(),
        }
    }
}

/// The CSV is only written after the walk, so a destination that cannot be
/// created has to be caught before the first request. The file itself is
/// left alone; a scratch file in the same directory checks writability.
fn check_output_path(path: &Path) -> Result<()> {
    if path.is_dir() {
        anyhow::bail!("Output CSV path is a directory: {}", path.display());
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        anyhow::bail!("Output CSV directory does not exist: {}", dir.display());
    }

    tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Output CSV directory is not writable: {}", dir.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CensusConfig::default();
        assert_eq!(config.node, "https://api.bitclout.com");
        assert_eq!(config.blocks_to_collect, 1000);
        assert_eq!(config.delay(), Duration::from_millis(1500));
        assert!(config.starting_block_height.is_none());
        assert!(config.output_csv_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CensusConfig::default();

        config.node = "api.bitclout.com".to_string();
        assert!(config.validate().is_err());

        config.node = "http://127.0.0.1:17001".to_string();
        assert!(config.validate().is_ok());

        config.blocks_to_collect = 0;
        assert!(config.validate().is_err());

        config.blocks_to_collect = 1;
        config.request_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collector_config_mapping() {
        let config = CensusConfig {
            node: "https://node.example/".to_string(),
            starting_block_height: Some(5000),
            blocks_to_collect: 10,
            delay_ms: 20,
            max_retries: Some(4),
            ..CensusConfig::default()
        };

        let collector = config.collector_config();
        assert_eq!(collector.node, "https://node.example");
        assert_eq!(collector.starting_height, Some(5000));
        assert_eq!(collector.blocks_to_collect, 10);
        assert_eq!(collector.retry, RetryPolicy::capped(Duration::from_millis(20), 4));
    }

    #[test]
    fn test_output_path_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CensusConfig {
            node: "http://127.0.0.1:17001".to_string(),
            ..CensusConfig::default()
        };

        config.output_csv_file = Some(dir.path().join("miners.csv"));
        assert!(config.validate().is_ok());
        // Validation never creates the destination.
        assert!(!dir.path().join("miners.csv").exists());

        config.output_csv_file = Some(dir.path().join("missing").join("miners.csv"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        config.output_csv_file = Some(dir.path().to_path_buf());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("is a directory"));

        config.output_csv_file = Some(PathBuf::from("miners.csv"));
        assert!(config.validate().is_ok());
    }
}

//! Configuration file for the `arbor` binary.

use arbor_log::IngestConfig;
use arbor_replay::ReplayConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Cannot read config {path}: {source}")]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// File is not valid config JSON
    #[error("Invalid config {path}: {source}")]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },
}

/// Everything tunable, as read from a JSON file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArborConfig {
    /// Log discovery and parsing
    pub ingest: IngestConfig,
    /// Replay behaviour
    pub replay: ReplayConfig,
}

impl ArborConfig {
    /// Load from a JSON file; absent sections keep their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

//! Ingestion configuration.

use serde::{Deserialize, Serialize};

/// Token layout of one log format generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Position of the timestamp token
    pub timestamp_offset: usize,
    /// Position of the event-kind tag; payload tokens follow it
    pub kind_offset: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            timestamp_offset: 1,
            kind_offset: 4,
        }
    }
}

/// Corpus ingestion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// File extension of log sources, without the dot
    pub suffix: String,
    /// In-flight events between readers and the merger
    pub channel_capacity: usize,
    /// Line layout
    pub parse: ParseConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            suffix: "log".to_string(),
            channel_capacity: 1000,
            parse: ParseConfig::default(),
        }
    }
}

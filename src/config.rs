//! Reader configuration.
//!
//! Settings are read from TOML. Every key is optional; missing entries take
//! the defaults below.
//!
//! ```toml
//! log_level = "debug"
//!
//! [chunking]
//! max_layer_length = 15000
//!
//! [text]
//! max_heading_chars = 60
//!
//! [cache]
//! capacity = 5
//! prefetch_behind = 1
//! prefetch_ahead = 2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunk::MAX_LAYER_LENGTH;
use crate::error::Result;
use crate::import::MAX_HEADING_CHARS;

pub const DEFAULT_CACHE_CAPACITY: usize = 5;
pub const DEFAULT_PREFETCH_BEHIND: usize = 1;
pub const DEFAULT_PREFETCH_AHEAD: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub text: TextConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// `EnvFilter` directive used by the CLI when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_layer_length")]
    pub max_layer_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextConfig {
    #[serde(default = "default_max_heading_chars")]
    pub max_heading_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_prefetch_behind")]
    pub prefetch_behind: usize,
    #[serde(default = "default_prefetch_ahead")]
    pub prefetch_ahead: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_layer_length() -> usize {
    MAX_LAYER_LENGTH
}

fn default_max_heading_chars() -> usize {
    MAX_HEADING_CHARS
}

fn default_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_prefetch_behind() -> usize {
    DEFAULT_PREFETCH_BEHIND
}

fn default_prefetch_ahead() -> usize {
    DEFAULT_PREFETCH_AHEAD
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            text: TextConfig::default(),
            cache: CacheConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_layer_length: default_max_layer_length(),
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            max_heading_chars: default_max_heading_chars(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            prefetch_behind: default_prefetch_behind(),
            prefetch_ahead: default_prefetch_ahead(),
        }
    }
}

impl ReaderConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ReaderConfig> {
    let contents = std::fs::read_to_string(path)?;
    ReaderConfig::from_toml_str(&contents)
}

//! # Configuration
//!
//! Optional TOML file with two sections:
//!
//! ```toml
//! [log]
//! format = "json"          # or "text"
//! filter = "polargraph=debug"
//!
//! [limits]
//! max_routes = 500
//! max_file_size = 1048576
//! ```
//!
//! A missing file yields the defaults. `POLARGRAPH_LOG_FORMAT` overrides
//! `[log] format`, and `RUST_LOG` overrides `[log] filter`.

use polargraph_core::GraphError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable selecting the log formatter.
pub const LOG_FORMAT_ENV: &str = "POLARGRAPH_LOG_FORMAT";

/// Default tracing filter.
pub const DEFAULT_LOG_FILTER: &str = "polargraph=info,polargraph_core=warn";

/// Default cap on routes printed by route-listing commands.
pub const DEFAULT_MAX_ROUTES: usize = 1000;

/// Default maximum input file size (100 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of the configuration file itself (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// CONFIG STRUCTURE
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub limits: Limits,
}

/// Log formatter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse an environment value; anything unrecognised is `None`.
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,

    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Upper bound on routes taken from a walk by route-listing commands.
    #[serde(default = "default_max_routes")]
    pub max_routes: usize,

    /// Input files larger than this many bytes are rejected.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_routes() -> usize {
    DEFAULT_MAX_ROUTES
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_routes: default_max_routes(),
            max_file_size: default_max_file_size(),
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Load the configuration at `path`, or the defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self, GraphError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| GraphError::Io(format!("Cannot read config metadata: {}", e)))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(GraphError::Parse(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| GraphError::Io(format!("Read config: {}", e)))?;
        Self::from_toml_str(&text)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, GraphError> {
        let config: Self =
            toml::from_str(text).map_err(|e| GraphError::Parse(format!("Config: {}", e)))?;
        if config.limits.max_routes == 0 {
            return Err(GraphError::Parse(
                "Config: limits.max_routes must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Apply the value of [`LOG_FORMAT_ENV`], if it names a known format.
    #[must_use]
    pub fn with_format_override(mut self, value: Option<&str>) -> Self {
        if let Some(format) = value.and_then(LogFormat::from_env_value) {
            self.log.format = format;
        }
        self
    }

    /// The tracing filter to use when `RUST_LOG` is unset.
    pub fn log_filter(&self, verbose: bool) -> String {
        if verbose {
            "polargraph=debug,polargraph_core=debug".to_string()
        } else {
            self.log.filter.clone()
        }
    }
}

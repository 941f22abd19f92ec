//! Replay configuration
//!
//! Values come from an optional TOML file and are then overridden by
//! command-line flags. Every field has a default, so an empty file is valid.

use std::path::Path;
use std::time::Duration;

use flow_collator::{AssemblerConfig, DEFAULT_SERVER_PORT};
use serde::Deserialize;

use crate::compare::{ComparePolicy, DEFAULT_IGNORED_HEADERS};
use crate::error::ConfigError;

/// Default connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Default read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;

/// Settings shared by flow assembly, replay and comparison
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayConfig {
    /// Stop after this many requests have been replayed
    pub limit:              Option<u64>,
    /// Headers excluded from comparison. Replaces the default list.
    pub ignore_headers:     Vec<String>,
    /// Cookies whose values are not compared
    pub strip_cookies:      Vec<String>,
    /// Port identifying the server side of captured flows
    pub server_port:        u16,
    /// Connect timeout, 0 disables
    pub connect_timeout_ms: u64,
    /// Per-read timeout on the replay socket, 0 disables
    pub read_timeout_ms:    u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            limit:              None,
            ignore_headers:     DEFAULT_IGNORED_HEADERS.iter().map(|h| h.to_string()).collect(),
            strip_cookies:      Vec::new(),
            server_port:        DEFAULT_SERVER_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms:    DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

impl ReplayConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read and parse a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn compare_policy(&self) -> ComparePolicy {
        ComparePolicy::new(&self.ignore_headers, self.strip_cookies.iter().cloned())
    }

    pub fn assembler(&self) -> AssemblerConfig {
        AssemblerConfig {
            server_port: self.server_port,
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.read_timeout_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

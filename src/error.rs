//! Error types for httpreplay.
//!
//! Only configuration and capture-opening failures are errors. Everything
//! that goes wrong while reconstructing or replaying traffic is recorded as a
//! failed comparison instead.

use thiserror::Error;

/// Main error type for httpreplay operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error opening or reading a capture file
    #[error("PCAP error: {0}")]
    Pcap(#[from] PcapError),
}

/// Errors related to configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Replay target is not a `host[:port]` authority
    #[error("Invalid replay target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Configuration file could not be parsed
    #[error("Invalid configuration file {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration file could not be read
    #[error("Cannot read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to capture file reading.
#[derive(Error, Debug)]
pub enum PcapError {
    /// File could not be opened
    #[error("Cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid PCAP format
    #[error("Invalid PCAP format in {path}: {reason}")]
    InvalidFormat { path: String, reason: String },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

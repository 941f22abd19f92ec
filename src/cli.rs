//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

use crate::config::ReplayConfig;
use crate::error::Result;
use crate::replay::Target;
use crate::report::DumpFormat;

/// Replay HTTP requests captured in pcap files and compare the replies.
///
/// Without --replay, every captured message is printed instead.
#[derive(Parser, Debug)]
#[command(name = "httpreplay")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Capture files, read in order
    #[arg(value_name = "PCAP-FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Server to replay the captured requests against
    #[arg(long, value_name = "DEST_HOST[:PORT]")]
    pub replay: Option<String>,

    /// Stop after replaying this many requests
    #[arg(long, value_name = "N")]
    pub limit: Option<u64>,

    /// Header to leave out of the comparison (repeatable, replaces the
    /// default Date/Server/X-Powered-By list)
    #[arg(long = "ignore-header", value_name = "HEADER_NAME")]
    pub ignore_headers: Vec<String>,

    /// Cookie whose value is not compared (repeatable)
    #[arg(long = "strip-cookie", value_name = "COOKIE_NAME")]
    pub strip_cookies: Vec<String>,

    /// Port identifying the server side of captured connections
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// TOML configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Connect timeout for replayed requests (0 disables)
    #[arg(long, value_name = "MS")]
    pub connect_timeout_ms: Option<u64>,

    /// Read timeout for replayed requests (0 disables)
    #[arg(long, value_name = "MS")]
    pub read_timeout_ms: Option<u64>,

    /// Print dumped messages as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Configuration file values (or defaults) with flags applied on top
    pub fn resolve_config(&self) -> Result<ReplayConfig> {
        let base = match &self.config {
            Some(path) => ReplayConfig::load(path)?,
            None => ReplayConfig::default(),
        };
        Ok(self.apply_overrides(base))
    }

    /// Replay target, if one was given
    pub fn target(&self) -> Result<Option<Target>> {
        Ok(self.replay.as_deref().map(str::parse::<Target>).transpose()?)
    }

    pub fn dump_format(&self) -> DumpFormat {
        if self.json { DumpFormat::Json } else { DumpFormat::Text }
    }

    /// Log filter for the `-v` count
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    fn apply_overrides(&self, mut config: ReplayConfig) -> ReplayConfig {
        if self.limit.is_some() {
            config.limit = self.limit;
        }
        if !self.ignore_headers.is_empty() {
            config.ignore_headers = self.ignore_headers.clone();
        }
        if !self.strip_cookies.is_empty() {
            config.strip_cookies = self.strip_cookies.clone();
        }
        if let Some(port) = self.server_port {
            config.server_port = port;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = self.read_timeout_ms {
            config.read_timeout_ms = ms;
        }
        config
    }
}

//! httpreplay: replay HTTP/1.x traffic captured in pcap files.
//!
//! Capture files are decoded into TCP packets ([`pcap`]), grouped into
//! completed connections and parsed into request/response pairs
//! ([`flow_collator`]), then each request is sent again to a target server
//! and the reply compared with the captured response ([`replay`],
//! [`compare`]).

pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod pcap;
pub mod replay;
pub mod report;

pub use compare::{Comparison, ComparePolicy, Mismatch, ResponseComparator, ResponseTransform};
pub use config::ReplayConfig;
pub use error::{ConfigError, Error, PcapError, Result};
pub use pcap::{CaptureFlows, PcapPacketSource};
pub use replay::{Replay, ReplayEngine, ReplayOutcome, ReplayStats, Target};
pub use report::{ConsoleReporter, DumpFormat, dump_flows};

/// Open every capture file up front so a missing or malformed file fails the
/// run before anything is replayed
pub fn open_captures<P: AsRef<std::path::Path>>(paths: &[P]) -> Result<Vec<PcapPacketSource>> {
    paths
        .iter()
        .map(|path| PcapPacketSource::open(path).map_err(Error::from))
        .collect()
}

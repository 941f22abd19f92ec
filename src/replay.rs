//! Replay of captured requests against a live server
//!
//! Each usable flow's request is re-serialized and sent over a fresh TCP
//! connection. The reply is read until the server closes the connection (or
//! a read times out after data has arrived), parsed, and compared with the
//! captured response. Network failures never
//! abort the run: the reply is treated as empty and the request counts as
//! failed.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use flow_collator::{Exchange, Flow, FlowKey, TcpPacket};
use h1wire::{HttpRequest, parse_response};
use http::uri::Authority;
use tracing::{debug, warn};

use crate::compare::{Comparison, ResponseComparator};
use crate::config::ReplayConfig;
use crate::error::ConfigError;

/// Port used when the target does not name one
pub const DEFAULT_TARGET_PORT: u16 = 80;

/// Replay destination, parsed from `host[:port]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    host: String,
    port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn connect(&self, timeout: Option<Duration>) -> io::Result<TcpStream> {
        let Some(timeout) = timeout else {
            return TcpStream::connect((self.host.as_str(), self.port));
        };

        let mut last_err = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "target resolved to no address")))
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidTarget {
            target: s.to_string(),
            reason: reason.to_string(),
        };

        let authority = Authority::from_str(s).map_err(|err| invalid(&err.to_string()))?;
        if authority.as_str().contains('@') {
            return Err(invalid("user info is not allowed"));
        }
        if authority.host().is_empty() {
            return Err(invalid("missing host"));
        }

        let port = match authority.port_u16() {
            Some(port) => port,
            // Port text present but not a u16
            None if authority.as_str().len() > authority.host().len() => {
                return Err(invalid("invalid port"));
            },
            None => DEFAULT_TARGET_PORT,
        };

        Ok(Self::new(authority.host(), port))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Result of replaying one captured exchange
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub key:        FlowKey,
    pub request:    HttpRequest,
    pub comparison: Comparison,
}

impl ReplayOutcome {
    pub fn is_match(&self) -> bool {
        self.comparison.is_match()
    }
}

/// Running totals of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub attempted: u64,
    pub matched:   u64,
}

impl ReplayStats {
    pub fn failed(&self) -> u64 {
        self.attempted - self.matched
    }

    /// True when no replayed request failed (also when none was replayed)
    pub fn all_matched(&self) -> bool {
        self.attempted == self.matched
    }

    fn record(&mut self, matched: bool) {
        self.attempted += 1;
        if matched {
            self.matched += 1;
        }
    }
}

impl fmt::Display for ReplayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sent {} requests, OK: {}, Failed: {}",
            self.attempted,
            self.matched,
            self.failed()
        )
    }
}

/// Sends captured requests to a [`Target`] and compares the replies
pub struct ReplayEngine {
    target:          Target,
    comparator:      ResponseComparator,
    limit:           Option<u64>,
    connect_timeout: Option<Duration>,
    read_timeout:    Option<Duration>,
}

impl ReplayEngine {
    /// Engine with default limit (none) and timeouts
    pub fn new(target: Target, comparator: ResponseComparator) -> Self {
        let defaults = ReplayConfig::default();
        Self {
            target,
            comparator,
            limit: None,
            connect_timeout: defaults.connect_timeout(),
            read_timeout: defaults.read_timeout(),
        }
    }

    pub fn from_config(target: Target, config: &ReplayConfig) -> Self {
        Self {
            target,
            comparator: ResponseComparator::new(config.compare_policy()),
            limit: config.limit,
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
        }
    }

    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_timeouts(mut self, connect: Option<Duration>, read: Option<Duration>) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    pub fn with_comparator(mut self, comparator: ResponseComparator) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Lazily replay every usable flow in order, stopping at the limit
    pub fn replay<I, P>(&self, flows: I) -> Replay<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Flow<P>>,
        P: TcpPacket,
    {
        Replay {
            engine:  self,
            flows:   flows.into_iter(),
            stats:   ReplayStats::default(),
            skipped: 0,
        }
    }

    /// Send one captured request and compare the reply
    pub fn replay_exchange(&self, exchange: Exchange) -> ReplayOutcome {
        let reply = self.fetch(&exchange.request);
        let comparison = self.comparator.compare(parse_response(&reply), exchange.response);
        ReplayOutcome {
            key: exchange.key,
            request: exchange.request,
            comparison,
        }
    }

    /// Raw reply bytes, empty on any network failure
    fn fetch(&self, request: &HttpRequest) -> Vec<u8> {
        match self.send(&request.to_wire()) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(target_addr = %self.target, method = %request.method, uri = %request.target, error = %err, "replay failed");
                Vec::new()
            },
        }
    }

    fn send(&self, payload: &[u8]) -> io::Result<Vec<u8>> {
        let mut stream = self.target.connect(self.connect_timeout)?;
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.read_timeout)?;
        stream.write_all(payload)?;

        let reply = read_reply(&mut stream)?;
        debug!(target_addr = %self.target, sent = payload.len(), received = reply.len(), "request replayed");
        Ok(reply)
    }
}

/// Read until the peer closes. A read timeout after some data has arrived
/// ends the reply instead of failing it.
fn read_reply<R: Read>(stream: &mut R) -> io::Result<Vec<u8>> {
    let mut reply = Vec::new();
    let mut buf = [0u8; 16 * 1024];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return Ok(reply),
            Ok(n) => reply.extend_from_slice(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {},
            Err(err) if is_timeout(&err) && !reply.is_empty() => {
                debug!(received = reply.len(), "read timed out, keeping partial reply");
                return Ok(reply);
            },
            Err(err) => return Err(err),
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Iterator of [`ReplayOutcome`]s, see [`ReplayEngine::replay`]
pub struct Replay<'e, I> {
    engine:  &'e ReplayEngine,
    flows:   I,
    stats:   ReplayStats,
    skipped: u64,
}

impl<I> Replay<'_, I> {
    /// Totals so far
    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    /// Flows passed over because they did not hold a request followed by a
    /// response
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<I, P> Iterator for Replay<'_, I>
where
    I: Iterator<Item = Flow<P>>,
    P: TcpPacket,
{
    type Item = ReplayOutcome;

    fn next(&mut self) -> Option<ReplayOutcome> {
        if self.engine.limit.is_some_and(|limit| self.stats.attempted >= limit) {
            return None;
        }

        for flow in self.flows.by_ref() {
            let Some(exchange) = flow.exchange() else {
                debug!(flow = %flow.key(), packets = flow.len(), "no request/response pair, skipping");
                self.skipped += 1;
                continue;
            };
            let outcome = self.engine.replay_exchange(exchange);
            self.stats.record(outcome.is_match());
            return Some(outcome);
        }
        None
    }
}

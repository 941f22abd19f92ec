//! Flow collation library
//!
//! Groups decoded TCP packets into connections, cuts each finished
//! connection into same-direction payload runs, and parses those runs as
//! HTTP/1.x messages.
//!
//! # Usage
//!
//! Implement the [`TcpPacket`] trait for your packet source (or produce
//! [`Packet`]s), then wrap the packet iterator in a [`SessionAssembler`]:
//!
//! ```ignore
//! use flow_collator::{AssemblerConfig, SessionAssembler};
//!
//! let flows = SessionAssembler::new(packets, AssemblerConfig::default());
//! for flow in flows {
//!     if let Some(exchange) = flow.exchange() {
//!         println!("{exchange}");
//!     }
//! }
//! ```
//!
//! Only connections whose opening SYN and a FIN+ACK were both captured are
//! emitted. Connections reset with RST, or still open when the input ends,
//! never are.

mod connection;
mod exchange;
mod segment;
mod traits;

pub use connection::{Flow, FlowKey};
pub use exchange::Exchange;
pub use h1wire::{Header, HttpMessage, HttpRequest, HttpResponse};
pub use segment::{DirectionalChunk, Segments};
pub use traits::{Direction, Packet, TcpFlags, TcpPacket};

use std::collections::HashMap;
use std::collections::hash_map::Entry;

#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Default port identifying the server side of a flow
pub const DEFAULT_SERVER_PORT: u16 = 80;

/// Configuration for flow assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Port that marks the server endpoint. Packets using it on neither side
    /// are ignored.
    pub server_port: u16,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

/// Table of in-progress flows.
///
/// Feed packets in capture order with [`FlowTable::add_packet`]; a completed
/// flow is returned from the call that carried its FIN+ACK.
pub struct FlowTable<P> {
    flows:   HashMap<FlowKey, Flow<P>>,
    config:  AssemblerConfig,
    /// Packets dropped because their flow's SYN was never seen
    orphans: u64,
}

impl<P: TcpPacket> Default for FlowTable<P> {
    fn default() -> Self {
        Self::new(AssemblerConfig::default())
    }
}

impl<P: TcpPacket> FlowTable<P> {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            flows: HashMap::new(),
            config,
            orphans: 0,
        }
    }

    /// Add a packet and potentially return a completed flow
    pub fn add_packet(&mut self, packet: P) -> Option<Flow<P>> {
        let (key, direction) = FlowKey::classify(&packet, self.config.server_port)?;
        let flags = packet.flags();

        match self.flows.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().push(packet),
            Entry::Vacant(entry) => {
                if !(direction.is_client() && flags.is_opening_syn()) {
                    // Start of this connection was not captured
                    self.orphans += 1;
                    trace_debug!(flow = %key, flags = %flags, "dropping packet of unknown flow");
                    return None;
                }
                trace_debug!(flow = %key, "flow opened");
                entry.insert(Flow::open(key, packet));
            },
        }

        if flags.is_rst() {
            let _discarded = self.flows.remove(&key);
            trace_debug!(flow = %key, packets = _discarded.map_or(0, |f| f.len()), "flow reset, discarding");
            return None;
        }

        if flags.is_fin_ack() {
            let flow = self.flows.remove(&key);
            trace_debug!(flow = %key, "flow completed");
            return flow;
        }

        None
    }

    /// Number of flows still waiting for completion
    pub fn pending(&self) -> usize {
        self.flows.len()
    }

    /// Number of packets dropped for lack of an observed SYN
    pub fn orphans(&self) -> u64 {
        self.orphans
    }
}

/// Streaming assembler: an iterator of completed flows over an iterator of
/// packets.
///
/// The sequence is single pass. Flows still open when the packet iterator is
/// exhausted are dropped, see [`SessionAssembler::finish`].
pub struct SessionAssembler<I, P> {
    packets: I,
    table:   FlowTable<P>,
}

impl<I, P> SessionAssembler<I, P>
where
    I: Iterator<Item = P>,
    P: TcpPacket,
{
    pub fn new(packets: impl IntoIterator<IntoIter = I>, config: AssemblerConfig) -> Self {
        Self {
            packets: packets.into_iter(),
            table:   FlowTable::new(config),
        }
    }

    /// Flow table state (pending flows, orphan count)
    pub fn table(&self) -> &FlowTable<P> {
        &self.table
    }

    /// Discard the assembler, returning how many incomplete flows were
    /// dropped with it
    pub fn finish(self) -> usize {
        let pending = self.table.pending();
        trace_debug!(pending, orphans = self.table.orphans(), "dropping incomplete flows");
        pending
    }
}

impl<I, P> Iterator for SessionAssembler<I, P>
where
    I: Iterator<Item = P>,
    P: TcpPacket,
{
    type Item = Flow<P>;

    fn next(&mut self) -> Option<Flow<P>> {
        for packet in self.packets.by_ref() {
            if let Some(flow) = self.table.add_packet(packet) {
                return Some(flow);
            }
        }
        None
    }
}

//! Flow identity and per-flow packet storage

use std::fmt;
use std::net::SocketAddrV4;

use h1wire::HttpMessage;

use crate::{
    exchange::Exchange,
    segment::Segments,
    traits::{Direction, TcpPacket},
};

/// Normalized identity of one TCP connection.
///
/// Both directions of a connection map to the same key: `server` is the
/// endpoint using the server port, `client` is the other one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub client: SocketAddrV4,
    pub server: SocketAddrV4,
}

impl FlowKey {
    /// Classify a packet against `server_port`.
    ///
    /// Returns `None` for packets lacking an IPv4 or TCP layer and for packets
    /// where neither port is `server_port`.
    pub fn classify<P: TcpPacket + ?Sized>(packet: &P, server_port: u16) -> Option<(FlowKey, Direction)> {
        let (src, dst) = packet.endpoints()?;
        if src.port() != server_port && dst.port() != server_port {
            return None;
        }
        let direction = Direction::of_packet(packet, server_port)?;
        let key = match direction {
            Direction::ClientToServer => FlowKey {
                client: src,
                server: dst,
            },
            Direction::ServerToClient => FlowKey {
                client: dst,
                server: src,
            },
        };
        Some((key, direction))
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.client, self.server)
    }
}

/// Packets of one completed (or in-progress) connection, in capture order
#[derive(Debug, Clone)]
pub struct Flow<P> {
    key:     FlowKey,
    packets: Vec<P>,
}

impl<P: TcpPacket> Flow<P> {
    /// Start a flow from its opening SYN
    pub(crate) fn open(key: FlowKey, syn: P) -> Self {
        Self {
            key,
            packets: vec![syn],
        }
    }

    pub(crate) fn push(&mut self, packet: P) {
        self.packets.push(packet);
    }

    pub fn key(&self) -> FlowKey {
        self.key
    }

    pub fn packets(&self) -> &[P] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Maximal same-direction payload runs, in order
    pub fn segments(&self) -> Segments<'_, P> {
        Segments::new(&self.packets, self.key.server.port())
    }

    /// Every chunk of the flow parsed as a message
    pub fn messages(&self) -> impl Iterator<Item = HttpMessage> + '_ {
        self.segments().map(|chunk| chunk.parse())
    }

    /// The flow's request/response pair, if its first two messages are
    /// exactly a request followed by a response
    pub fn exchange(&self) -> Option<Exchange> {
        Exchange::from_messages(self.key, self.messages())
    }
}

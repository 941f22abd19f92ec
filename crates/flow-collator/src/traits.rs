//! Traits for abstracting packet sources
//!
//! The assembler works with any decoded packet that exposes its IPv4
//! addresses, TCP ports, TCP flags and payload. Capture-file readers implement
//! [`TcpPacket`] (or produce the owned [`Packet`]) and feed the sequence in
//! capture order.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::Bytes;

/// TCP control flags as carried in the header's flag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TcpFlags(pub u8);

impl TcpFlags {
    pub const FIN: TcpFlags = TcpFlags(0x01);
    pub const SYN: TcpFlags = TcpFlags(0x02);
    pub const RST: TcpFlags = TcpFlags(0x04);
    pub const PSH: TcpFlags = TcpFlags(0x08);
    pub const ACK: TcpFlags = TcpFlags(0x10);
    pub const URG: TcpFlags = TcpFlags(0x20);
    pub const ECE: TcpFlags = TcpFlags(0x40);
    pub const CWR: TcpFlags = TcpFlags(0x80);

    const NAMES: [(TcpFlags, &'static str); 8] = [
        (Self::FIN, "FIN"),
        (Self::SYN, "SYN"),
        (Self::RST, "RST"),
        (Self::PSH, "PSH"),
        (Self::ACK, "ACK"),
        (Self::URG, "URG"),
        (Self::ECE, "ECE"),
        (Self::CWR, "CWR"),
    ];

    /// Whether every bit of `other` is set
    pub fn contains(self, other: TcpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// SYN set and ACK clear: the first packet of a handshake
    pub fn is_opening_syn(self) -> bool {
        self.contains(Self::SYN) && !self.contains(Self::ACK)
    }

    /// FIN and ACK both set
    pub fn is_fin_ack(self) -> bool {
        self.contains(Self::FIN | Self::ACK)
    }

    /// RST set
    pub fn is_rst(self) -> bool {
        self.contains(Self::RST)
    }
}

impl std::ops::BitOr for TcpFlags {
    type Output = TcpFlags;

    fn bitor(self, rhs: TcpFlags) -> TcpFlags {
        TcpFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "-")?;
        }
        Ok(())
    }
}

/// Direction a payload traveled within a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Request data (destination is the server port)
    ClientToServer,
    /// Response data (everything else in the flow)
    ServerToClient,
}

impl Direction {
    /// Direction of a packet given the server port: client-to-server iff the
    /// destination port is the server port. `None` without a TCP layer.
    pub fn of_packet<P: TcpPacket + ?Sized>(packet: &P, server_port: u16) -> Option<Direction> {
        let (_, dst_port) = packet.ports()?;
        Some(if dst_port == server_port {
            Direction::ClientToServer
        } else {
            Direction::ServerToClient
        })
    }

    pub fn is_client(self) -> bool {
        self == Direction::ClientToServer
    }
}

/// Trait for decoded packets that can be assembled into flows.
///
/// Implement this trait for your packet type (e.g., frames decoded from a pcap
/// file) to feed the assembler.
pub trait TcpPacket {
    /// Source and destination IPv4 addresses, `None` without an IPv4 layer
    fn ipv4(&self) -> Option<(Ipv4Addr, Ipv4Addr)>;

    /// Source and destination TCP ports, `None` without a TCP layer
    fn ports(&self) -> Option<(u16, u16)>;

    /// TCP control flags (empty without a TCP layer)
    fn flags(&self) -> TcpFlags;

    /// TCP payload bytes, possibly empty
    fn payload(&self) -> &[u8];

    /// Source and destination endpoints when both layers are present
    fn endpoints(&self) -> Option<(SocketAddrV4, SocketAddrV4)> {
        let (src_ip, dst_ip) = self.ipv4()?;
        let (src_port, dst_port) = self.ports()?;
        Some((
            SocketAddrV4::new(src_ip, src_port),
            SocketAddrV4::new(dst_ip, dst_port),
        ))
    }
}

/// An owned decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub addrs:   Option<(Ipv4Addr, Ipv4Addr)>,
    pub ports:   Option<(u16, u16)>,
    pub flags:   TcpFlags,
    pub payload: Bytes,
}

impl Packet {
    /// A TCP/IPv4 packet from `src` to `dst`
    pub fn tcp(src: SocketAddrV4, dst: SocketAddrV4, flags: TcpFlags, payload: impl Into<Bytes>) -> Self {
        Self {
            addrs: Some((*src.ip(), *dst.ip())),
            ports: Some((src.port(), dst.port())),
            flags,
            payload: payload.into(),
        }
    }

    /// A packet without an IPv4/TCP layer (IPv6, UDP, ARP, ...)
    pub fn other() -> Self {
        Self {
            addrs:   None,
            ports:   None,
            flags:   TcpFlags::default(),
            payload: Bytes::new(),
        }
    }
}

impl TcpPacket for Packet {
    fn ipv4(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        self.addrs
    }

    fn ports(&self) -> Option<(u16, u16)> {
        self.ports
    }

    fn flags(&self) -> TcpFlags {
        self.flags
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl<P: TcpPacket + ?Sized> TcpPacket for &P {
    fn ipv4(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        (**self).ipv4()
    }

    fn ports(&self) -> Option<(u16, u16)> {
        (**self).ports()
    }

    fn flags(&self) -> TcpFlags {
        (**self).flags()
    }

    fn payload(&self) -> &[u8] {
        (**self).payload()
    }
}

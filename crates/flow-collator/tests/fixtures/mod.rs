#![allow(dead_code)]
//! Packet building helpers for tests
//!
//! These functions construct the packet sequence of a whole captured
//! connection: handshake, segmented payloads, and teardown.

use flow_collator::{Packet, TcpFlags};
use std::net::{Ipv4Addr, SocketAddrV4};

/// Flag combinations seen in real captures
pub const SYN: TcpFlags = TcpFlags(0x02);
pub const SYN_ACK: TcpFlags = TcpFlags(0x12);
pub const ACK: TcpFlags = TcpFlags(0x10);
pub const PSH_ACK: TcpFlags = TcpFlags(0x18);
pub const FIN_ACK: TcpFlags = TcpFlags(0x11);
pub const RST_ACK: TcpFlags = TcpFlags(0x14);

pub fn server() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 10), 80)
}

pub fn client(port: u16) -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 20), port)
}

/// One captured connection between `client` and `server`
pub struct Conversation {
    pub client: SocketAddrV4,
    pub server: SocketAddrV4,
    packets:    Vec<Packet>,
}

impl Conversation {
    /// Start with the three-way handshake
    pub fn open(client: SocketAddrV4, server: SocketAddrV4) -> Self {
        let mut conv = Self {
            client,
            server,
            packets: Vec::new(),
        };
        conv.push_client(SYN, b"");
        conv.push_server(SYN_ACK, b"");
        conv.push_client(ACK, b"");
        conv
    }

    /// A conversation whose handshake was not captured
    pub fn mid_stream(client: SocketAddrV4, server: SocketAddrV4) -> Self {
        Self {
            client,
            server,
            packets: Vec::new(),
        }
    }

    pub fn push_client(&mut self, flags: TcpFlags, payload: &[u8]) -> &mut Self {
        self.packets.push(Packet::tcp(self.client, self.server, flags, payload.to_vec()));
        self
    }

    pub fn push_server(&mut self, flags: TcpFlags, payload: &[u8]) -> &mut Self {
        self.packets.push(Packet::tcp(self.server, self.client, flags, payload.to_vec()));
        self
    }

    /// Client data split into `segment`-sized packets, each acknowledged
    pub fn client_data(&mut self, data: &[u8], segment: usize) -> &mut Self {
        for part in data.chunks(segment) {
            self.push_client(PSH_ACK, part);
            self.push_server(ACK, b"");
        }
        self
    }

    /// Server data split into `segment`-sized packets, each acknowledged
    pub fn server_data(&mut self, data: &[u8], segment: usize) -> &mut Self {
        for part in data.chunks(segment) {
            self.push_server(PSH_ACK, part);
            self.push_client(ACK, b"");
        }
        self
    }

    /// Server-initiated close: FIN+ACK from server, then client, then ACK
    pub fn close(&mut self) -> &mut Self {
        self.push_server(FIN_ACK, b"");
        self.push_client(FIN_ACK, b"");
        self.push_server(ACK, b"");
        self
    }

    pub fn reset(&mut self) -> &mut Self {
        self.push_server(RST_ACK, b"")
    }

    pub fn packets(&self) -> Vec<Packet> {
        self.packets.clone()
    }
}

/// Interleave several packet lists round-robin, preserving each list's order
pub fn interleave(lists: Vec<Vec<Packet>>) -> Vec<Packet> {
    let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
    let mut out = Vec::new();
    loop {
        let mut progressed = false;
        for iter in iters.iter_mut() {
            if let Some(packet) = iter.next() {
                out.push(packet);
                progressed = true;
            }
        }
        if !progressed {
            return out;
        }
    }
}

pub const REQUEST: &[u8] = b"POST /api/items HTTP/1.1\r\nHost: shop.example\r\nContent-Type: application/json\r\nContent-Length: 16\r\n\r\n{\"name\":\"lamp\"}\n";

pub const RESPONSE: &[u8] = b"HTTP/1.1 201 Created\r\nServer: nginx\r\nDate: Mon, 01 Jan 2024 00:00:00 GMT\r\nSet-Cookie: sid=abc123; Path=/\r\nContent-Length: 11\r\n\r\n{\"id\":4242}";

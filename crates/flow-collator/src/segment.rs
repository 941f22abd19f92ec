//! Directional coalescing of a flow's payloads
//!
//! Direction changes, not packet boundaries, decide where one message ends
//! and the next begins. Packets with an empty payload (handshake, pure ACKs,
//! the closing FIN) are skipped and do not split a run.

use bytes::{Bytes, BytesMut};
use h1wire::{HttpMessage, parse_request, parse_response};

use crate::traits::{Direction, TcpPacket};

/// Payload bytes of one same-direction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionalChunk {
    pub direction: Direction,
    pub data:      Bytes,
}

impl DirectionalChunk {
    /// Parse the chunk with the grammar its direction implies
    pub fn parse(&self) -> HttpMessage {
        match self.direction {
            Direction::ClientToServer => HttpMessage::Request(parse_request(&self.data)),
            Direction::ServerToClient => HttpMessage::Response(parse_response(&self.data)),
        }
    }
}

/// Iterator over the [`DirectionalChunk`]s of a flow's packets
pub struct Segments<'a, P> {
    packets:     std::slice::Iter<'a, P>,
    server_port: u16,
    current:     Option<(Direction, BytesMut)>,
}

impl<'a, P: TcpPacket> Segments<'a, P> {
    pub fn new(packets: &'a [P], server_port: u16) -> Self {
        Self {
            packets: packets.iter(),
            server_port,
            current: None,
        }
    }
}

impl<P: TcpPacket> Iterator for Segments<'_, P> {
    type Item = DirectionalChunk;

    fn next(&mut self) -> Option<DirectionalChunk> {
        for packet in self.packets.by_ref() {
            let payload = packet.payload();
            if payload.is_empty() {
                continue;
            }
            let Some(direction) = Direction::of_packet(packet, self.server_port) else {
                continue;
            };

            let same_run = matches!(&self.current, Some((dir, _)) if *dir == direction);
            if same_run {
                if let Some((_, buf)) = self.current.as_mut() {
                    buf.extend_from_slice(payload);
                }
                continue;
            }

            let finished = self.current.replace((direction, BytesMut::from(payload)));
            if let Some((direction, buf)) = finished {
                return Some(DirectionalChunk {
                    direction,
                    data: buf.freeze(),
                });
            }
        }

        self.current.take().map(|(direction, buf)| DirectionalChunk {
            direction,
            data: buf.freeze(),
        })
    }
}

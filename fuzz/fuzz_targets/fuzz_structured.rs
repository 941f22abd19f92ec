//! Fuzz target: structured packet sequences
//!
//! Generates packets for a handful of connections with random flags and
//! payloads, and runs them through assembly, segmentation and parsing. Every
//! payload byte of an emitted flow must end up in exactly one chunk.

#![no_main]

use std::net::{Ipv4Addr, SocketAddrV4};

use arbitrary::Arbitrary;
use flow_collator::{AssemblerConfig, Packet, SessionAssembler, TcpFlags, TcpPacket};
use libfuzzer_sys::fuzz_target;

const SERVER_PORT: u16 = 80;

/// One packet of one of up to four connections
#[derive(Debug, Arbitrary)]
struct FuzzPacket {
    connection:  u8,
    from_client: bool,
    flags:       u8,
    payload:     Vec<u8>,
}

impl FuzzPacket {
    fn to_packet(&self) -> Packet {
        let client = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 40000 + u16::from(self.connection % 4));
        let server = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), SERVER_PORT);
        let (src, dst) = if self.from_client { (client, server) } else { (server, client) };
        let mut payload = self.payload.clone();
        payload.truncate(4096);
        Packet::tcp(src, dst, TcpFlags(self.flags), payload)
    }
}

fuzz_target!(|packets: Vec<FuzzPacket>| {
    let packets: Vec<Packet> = packets.iter().map(FuzzPacket::to_packet).collect();
    let assembler = SessionAssembler::new(packets, AssemblerConfig::default());

    for flow in assembler {
        let expected: usize = flow.packets().iter().map(|p| p.payload().len()).sum();
        let chunked: usize = flow.segments().map(|chunk| chunk.data.len()).sum();
        assert_eq!(expected, chunked);

        for message in flow.messages() {
            let _ = message.to_string();
        }
        if let Some(exchange) = flow.exchange() {
            let _ = exchange.request.to_wire();
        }
    }
});

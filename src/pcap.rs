//! Capture file reading and frame decoding.
//!
//! Frames are decoded down to IPv4 and TCP; anything else (ARP, IPv6, UDP,
//! truncated headers) becomes a packet without addresses or ports, which
//! flow assembly ignores.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use etherparse::{Ethernet2HeaderSlice, Ipv4HeaderSlice, TcpHeaderSlice};
use flate2::read::GzDecoder;
use flow_collator::{AssemblerConfig, Flow, Packet, SessionAssembler, TcpFlags};
use pcap_parser::pcapng::Block;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{PcapBlockOwned, PcapError as ParserError, create_reader};
use tracing::{debug, info, warn};

use crate::error::PcapError;

/// Buffer size for reading PCAP files
const BUFFER_SIZE: usize = 65536;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub const LINKTYPE_ETHERNET: i32 = 1;
pub const LINKTYPE_RAW: i32 = 101;
pub const LINKTYPE_LINUX_SLL: i32 = 113;
pub const LINKTYPE_IPV4: i32 = 228;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_VLAN: u16 = 0x8100;
const IP_PROTO_TCP: u8 = 6;

/// Linux cooked capture header length
const SLL_HEADER_LEN: usize = 16;

/// Decoded packets of one capture file, in capture order.
///
/// Both classic pcap and pcapng are accepted, optionally gzip-compressed.
/// A read error part way through ends the iteration after a warning; the
/// packets read up to that point are still delivered.
pub struct PcapPacketSource {
    reader:    Box<dyn PcapReaderIterator>,
    name:      String,
    /// Link type per interface (a single entry for classic pcap)
    linktypes: Vec<i32>,
    frames:    u64,
    done:      bool,
}

impl PcapPacketSource {
    /// Open a capture file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PcapError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|source| PcapError::Open {
            path: name.clone(),
            source,
        })?;
        Self::from_reader(name, file)
    }

    /// Read a capture from any byte stream
    pub fn from_reader(name: impl Into<String>, reader: impl Read + 'static) -> Result<Self, PcapError> {
        let name = name.into();
        let mut buffered = BufReader::with_capacity(BUFFER_SIZE, reader);
        let gzipped = buffered
            .fill_buf()
            .map_err(|source| PcapError::Open {
                path: name.clone(),
                source,
            })?
            .starts_with(&GZIP_MAGIC);

        let input: Box<dyn Read> = if gzipped {
            Box::new(GzDecoder::new(buffered))
        } else {
            Box::new(buffered)
        };

        let reader = create_reader(BUFFER_SIZE, input).map_err(|e| PcapError::InvalidFormat {
            path:   name.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            reader,
            name,
            linktypes: Vec::new(),
            frames: 0,
            done: false,
        })
    }

    /// File name as given when opening
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frames read so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn stop(&mut self, error: &str) {
        warn!(path = %self.name, frames = self.frames, error = %error, "capture read error, skipping rest of file");
        self.done = true;
    }
}

impl Iterator for PcapPacketSource {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        while !self.done {
            let failure = match self.reader.next() {
                Ok((offset, block)) => {
                    let packet = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            self.linktypes = vec![header.network.0];
                            None
                        },
                        PcapBlockOwned::Legacy(frame) => {
                            Some(decode_frame(linktype_of(&self.linktypes, 0), frame.data))
                        },
                        PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                            self.linktypes.push(idb.linktype.0);
                            None
                        },
                        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                            let caplen = (epb.caplen as usize).min(epb.data.len());
                            let linktype = linktype_of(&self.linktypes, epb.if_id as usize);
                            Some(decode_frame(linktype, &epb.data[..caplen]))
                        },
                        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                            Some(decode_frame(linktype_of(&self.linktypes, 0), spb.data))
                        },
                        _ => None,
                    };
                    self.reader.consume(offset);

                    if let Some(packet) = packet {
                        self.frames += 1;
                        return Some(packet);
                    }
                    continue;
                },
                Err(ParserError::Eof) => {
                    self.done = true;
                    continue;
                },
                Err(ParserError::Incomplete(_)) => match self.reader.refill() {
                    Ok(()) => continue,
                    Err(e) => e.to_string(),
                },
                Err(e) => e.to_string(),
            };
            self.stop(&failure);
        }
        None
    }
}

fn linktype_of(linktypes: &[i32], interface: usize) -> i32 {
    linktypes.get(interface).copied().unwrap_or(LINKTYPE_ETHERNET)
}

/// Decode one link-layer frame
pub fn decode_frame(linktype: i32, data: &[u8]) -> Packet {
    let ip = match linktype {
        LINKTYPE_ETHERNET => ethernet_payload(data),
        LINKTYPE_RAW | LINKTYPE_IPV4 => Some(data),
        LINKTYPE_LINUX_SLL => sll_payload(data),
        _ => None,
    };
    ip.and_then(decode_ipv4).unwrap_or_else(Packet::other)
}

fn ethernet_payload(data: &[u8]) -> Option<&[u8]> {
    let eth = Ethernet2HeaderSlice::from_slice(data).ok()?;
    let mut ether_type = eth.ether_type().0;
    let mut offset = eth.slice().len();

    // One 802.1Q tag
    if ether_type == ETHERTYPE_VLAN {
        let tag = data.get(offset..offset + 4)?;
        ether_type = u16::from_be_bytes([tag[2], tag[3]]);
        offset += 4;
    }

    (ether_type == ETHERTYPE_IPV4).then(|| &data[offset..])
}

fn sll_payload(data: &[u8]) -> Option<&[u8]> {
    let header = data.get(..SLL_HEADER_LEN)?;
    let protocol = u16::from_be_bytes([header[14], header[15]]);
    (protocol == ETHERTYPE_IPV4).then(|| &data[SLL_HEADER_LEN..])
}

/// Decode an IPv4 datagram. `None` when there is no IPv4 header at all.
fn decode_ipv4(data: &[u8]) -> Option<Packet> {
    let ip = Ipv4HeaderSlice::from_slice(data).ok()?;
    let header_len = ip.slice().len();
    let mut packet = Packet::other();
    packet.addrs = Some((ip.source_addr(), ip.destination_addr()));

    if ip.protocol().0 != IP_PROTO_TCP {
        return Some(packet);
    }

    // Ethernet padding follows the datagram; total length 0 means the
    // capture came from a segmentation-offloading NIC
    let end = match ip.total_len() as usize {
        0 => data.len(),
        total => total.clamp(header_len, data.len()),
    };
    let segment = &data[header_len..end];

    let Ok(tcp) = TcpHeaderSlice::from_slice(segment) else {
        debug!(len = segment.len(), "truncated TCP header");
        return Some(packet);
    };

    packet.ports = Some((tcp.source_port(), tcp.destination_port()));
    packet.flags = tcp_flags(&tcp);
    packet.payload = bytes::Bytes::copy_from_slice(&segment[tcp.slice().len()..]);
    Some(packet)
}

fn tcp_flags(tcp: &TcpHeaderSlice<'_>) -> TcpFlags {
    [
        (tcp.fin(), TcpFlags::FIN),
        (tcp.syn(), TcpFlags::SYN),
        (tcp.rst(), TcpFlags::RST),
        (tcp.psh(), TcpFlags::PSH),
        (tcp.ack(), TcpFlags::ACK),
        (tcp.urg(), TcpFlags::URG),
        (tcp.ece(), TcpFlags::ECE),
        (tcp.cwr(), TcpFlags::CWR),
    ]
    .into_iter()
    .filter(|(set, _)| *set)
    .fold(TcpFlags::default(), |acc, (_, flag)| acc | flag)
}

/// Completed flows of several capture files, each assembled on its own.
///
/// Files are read in order; flows still open at the end of a file are
/// dropped before the next file starts.
pub struct CaptureFlows {
    sources: std::vec::IntoIter<PcapPacketSource>,
    current: Option<SessionAssembler<PcapPacketSource, Packet>>,
    config:  AssemblerConfig,
}

impl CaptureFlows {
    pub fn new(sources: Vec<PcapPacketSource>, config: AssemblerConfig) -> Self {
        Self {
            sources: sources.into_iter(),
            current: None,
            config,
        }
    }
}

impl Iterator for CaptureFlows {
    type Item = Flow<Packet>;

    fn next(&mut self) -> Option<Flow<Packet>> {
        loop {
            if let Some(flow) = self.current.as_mut().and_then(|assembler| assembler.next()) {
                return Some(flow);
            }

            if let Some(finished) = self.current.take() {
                let orphans = finished.table().orphans();
                let incomplete = finished.finish();
                debug!(incomplete, orphans, "capture file done");
            }

            let source = self.sources.next()?;
            info!(path = %source.name(), "reading capture");
            self.current = Some(SessionAssembler::new(source, self.config));
        }
    }
}

//! Capture-file builders for integration tests
#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use httpreplay::Target;
use tempfile::NamedTempFile;

pub const SYN: u8 = 0x02;
pub const SYN_ACK: u8 = 0x12;
pub const ACK: u8 = 0x10;
pub const PSH_ACK: u8 = 0x18;
pub const FIN_ACK: u8 = 0x11;
pub const RST: u8 = 0x04;

const CLIENT_IP: [u8; 4] = [192, 168, 1, 10];
const SERVER_IP: [u8; 4] = [192, 168, 1, 20];
pub const SERVER_PORT: u16 = 80;

/// Offset of the TCP flag byte behind Ethernet and a 20 byte IPv4 header
const TCP_FLAGS_OFFSET: usize = 14 + 20 + 13;

/// Ethernet/IPv4/TCP frame with the given flag byte
pub fn frame(src: ([u8; 4], u16), dst: ([u8; 4], u16), flags: u8, payload: &[u8]) -> Vec<u8> {
    let builder = etherparse::PacketBuilder::ethernet2([0; 6], [0; 6])
        .ipv4(src.0, dst.0, 64)
        .tcp(src.1, dst.1, 1, 65535);
    let mut buf = Vec::new();
    builder.write(&mut buf, payload).unwrap();
    buf[TCP_FLAGS_OFFSET] = flags;
    buf
}

/// In-order list of frames making up a capture
#[derive(Default)]
pub struct Capture {
    frames: Vec<Vec<u8>>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&mut self, port: u16, flags: u8, payload: &[u8]) -> &mut Self {
        self.frames.push(frame((CLIENT_IP, port), (SERVER_IP, SERVER_PORT), flags, payload));
        self
    }

    pub fn server(&mut self, port: u16, flags: u8, payload: &[u8]) -> &mut Self {
        self.frames.push(frame((SERVER_IP, SERVER_PORT), (CLIENT_IP, port), flags, payload));
        self
    }

    pub fn handshake(&mut self, port: u16) -> &mut Self {
        self.client(port, SYN, b"").server(port, SYN_ACK, b"").client(port, ACK, b"")
    }

    /// Complete connection: handshake, request, response, close
    pub fn exchange(&mut self, port: u16, request: &[u8], response: &[u8]) -> &mut Self {
        self.handshake(port)
            .client(port, PSH_ACK, request)
            .server(port, ACK, b"")
            .server(port, PSH_ACK, response)
            .client(port, ACK, b"")
            .server(port, FIN_ACK, b"")
            .client(port, FIN_ACK, b"")
            .server(port, ACK, b"")
    }

    /// Classic pcap file holding the frames
    pub fn write(&self) -> NamedTempFile {
        let mut data = Vec::new();
        data.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&65535u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        for (i, frame) in self.frames.iter().enumerate() {
            let len = frame.len() as u32;
            data.extend_from_slice(&(i as u32).to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
            data.extend_from_slice(&len.to_le_bytes());
            data.extend_from_slice(&len.to_le_bytes());
            data.extend_from_slice(frame);
        }

        let mut file = NamedTempFile::with_suffix(".pcap").unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        file
    }
}

pub fn request(path: &str) -> Vec<u8> {
    format!("GET {path} HTTP/1.1\r\nHost: example.com\r\n\r\n").into_bytes()
}

pub fn response(date: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nDate: {date}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

/// Server answering `connections` requests with `reply(request)`, then
/// closing each connection. Returns the request lines it received.
pub fn serve<F>(connections: usize, reply: F) -> (Target, thread::JoinHandle<Vec<String>>)
where
    F: Fn(&str) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for stream in listener.incoming().take(connections) {
            let mut stream = stream.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = stream.read(&mut buf).unwrap();
            let text = String::from_utf8_lossy(&buf[..n]).into_owned();
            let request_line = text.lines().next().unwrap_or_default().to_string();
            stream.write_all(&reply(&request_line)).unwrap();
            seen.push(request_line);
        }
        seen
    });
    (Target::new("127.0.0.1", port), handle)
}

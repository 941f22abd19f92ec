//! Forgiving HTTP/1.x parsing
//!
//! A captured buffer is assumed to hold exactly one message. There is no
//! Content-Length or chunked handling: the body is whatever follows the first
//! blank line. Malformed input still produces a message, whose wrong fields
//! then fail comparison downstream.

use crate::http_types::{Header, HttpRequest, HttpResponse};

/// Check if data starts with an HTTP/1.x request
pub fn is_http1_request(data: &[u8]) -> bool {
    data.starts_with(b"GET ")
        || data.starts_with(b"POST ")
        || data.starts_with(b"PUT ")
        || data.starts_with(b"DELETE ")
        || data.starts_with(b"HEAD ")
        || data.starts_with(b"OPTIONS ")
        || data.starts_with(b"PATCH ")
        || data.starts_with(b"CONNECT ")
        || data.starts_with(b"TRACE ")
}

/// Check if data starts with an HTTP/1.x response
pub fn is_http1_response(data: &[u8]) -> bool {
    data.starts_with(b"HTTP/1.0") || data.starts_with(b"HTTP/1.1")
}

/// Parse a client-to-server buffer as a request
pub fn parse_request(data: &[u8]) -> HttpRequest {
    if !data.is_empty() && !is_http1_request(data) {
        crate::trace_warn!(len = data.len(), "client buffer does not start with a known method");
    }
    let raw = split_message(data);
    let [method, target, version] = raw.start_fields();
    HttpRequest {
        method,
        target,
        version,
        headers: raw.headers(),
        body: raw.body.to_vec(),
    }
}

/// Parse a server-to-client buffer as a response
pub fn parse_response(data: &[u8]) -> HttpResponse {
    if !data.is_empty() && !is_http1_response(data) {
        crate::trace_warn!(len = data.len(), "server buffer does not start with an HTTP/1.x status line");
    }
    let raw = split_message(data);
    let [version, code, status] = raw.start_fields();
    HttpResponse {
        version,
        code: code.parse().ok(),
        code_text: code,
        status,
        headers: raw.headers(),
        body: raw.body.to_vec(),
    }
}

/// A buffer cut into start line, header lines and body
struct RawMessage<'a> {
    start_line:   &'a [u8],
    header_lines: Vec<&'a [u8]>,
    body:         &'a [u8],
}

impl RawMessage<'_> {
    /// Split the start line on single spaces into exactly three fields. The
    /// third field keeps any further spaces; missing fields are empty.
    fn start_fields(&self) -> [String; 3] {
        let mut parts = self.start_line.splitn(3, |&b| b == b' ');
        let mut next = || parts.next().map(lossy).unwrap_or_default();
        [next(), next(), next()]
    }

    fn headers(&self) -> Vec<Header> {
        self.header_lines.iter().map(|line| split_header(line)).collect()
    }
}

/// Cut `data` into lines on CRLF up to the first empty line.
///
/// A trailing CRLF at the very end of the buffer counts as that empty line.
/// When no empty line exists at all, every line is part of the head and the
/// body is empty.
fn split_message(data: &[u8]) -> RawMessage<'_> {
    let mut lines = Vec::new();
    let mut body = &data[data.len()..];
    let mut terminated = false;
    let mut pos = 0;

    loop {
        match find_crlf(data, pos) {
            Some(end) => {
                if end == pos {
                    body = &data[end + 2..];
                    terminated = true;
                    break;
                }
                lines.push(&data[pos..end]);
                pos = end + 2;
            },
            None => {
                if pos >= data.len() {
                    terminated = true;
                } else {
                    lines.push(&data[pos..]);
                }
                break;
            },
        }
    }

    if !terminated {
        crate::trace_warn!(len = data.len(), "message has no blank line, treating it as head only");
    }

    let mut lines = lines.into_iter();
    let start_line = lines.next().unwrap_or_default();
    RawMessage {
        start_line,
        header_lines: lines.collect(),
        body,
    }
}

/// Split a header line once on `": "`
fn split_header(line: &[u8]) -> Header {
    match find_subslice(line, b": ") {
        Some(idx) => Header {
            name:  lossy(&line[..idx]),
            value: Some(lossy(&line[idx + 2..])),
        },
        None => Header {
            name:  lossy(line),
            value: None,
        },
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Find the position of `\r\n` starting at `from` in `data`.
fn find_crlf(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    find_subslice(&data[from..], b"\r\n").map(|p| from + p)
}

fn find_subslice(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).position(|w| w == needle)
}

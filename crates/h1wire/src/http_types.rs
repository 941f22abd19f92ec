//! HTTP/1.x request/response types
//!
//! Messages keep the text they were parsed from: header names keep their
//! case, duplicates stay in arrival order, and nothing is validated. A request
//! written back with [`HttpRequest::to_wire`] reproduces the captured bytes of
//! a well-formed message.

use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// One header line
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Header {
    /// Header name as captured (case preserved)
    pub name:  String,
    /// Header value, `None` when the line had no `": "` separator. In that
    /// case `name` holds the whole line.
    pub value: Option<String>,
}

impl Header {
    /// Create a `name: value` header
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name:  name.into(),
            value: Some(value.into()),
        }
    }

    /// Whether the header name matches `name`, ignoring ASCII case
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Value as a string slice, empty when the line had no separator
    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    fn write_line(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.name.as_bytes());
        if let Some(value) = &self.value {
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}: {}", self.name, value),
            None => write!(f, "{}", self.name),
        }
    }
}

/// HTTP request parsed from a client-to-server buffer
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HttpRequest {
    /// Request method (first request-line field)
    pub method:  String,
    /// Request target (second request-line field)
    pub target:  String,
    /// Protocol version (remainder of the request line)
    pub version: String,
    /// Header lines in arrival order
    pub headers: Vec<Header>,
    /// Everything after the blank line
    #[cfg_attr(feature = "serde", serde(serialize_with = "lossy_text"))]
    pub body:    Vec<u8>,
}

impl HttpRequest {
    /// Serialize back to wire form.
    ///
    /// Request line, each header followed by CRLF, a blank line, then the body
    /// unchanged. No header is added or rewritten.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.method.len() + self.target.len() + self.version.len() + self.body.len() + 64,
        );
        out.extend_from_slice(self.method.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.target.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.version.as_bytes());
        out.extend_from_slice(b"\r\n");
        for header in &self.headers {
            header.write_line(&mut out);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} {}", self.method, self.target, self.version)?;
        write_head_and_body(f, &self.headers, &self.body)
    }
}

/// HTTP response parsed from a server-to-client buffer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HttpResponse {
    /// Protocol version (first status-line field)
    pub version:   String,
    /// Status-line second field exactly as received
    pub code_text: String,
    /// `code_text` as a number, `None` if it is not one
    pub code:      Option<u16>,
    /// Reason phrase (remainder of the status line, may contain spaces)
    pub status:    String,
    /// Header lines in arrival order
    pub headers:   Vec<Header>,
    /// Everything after the blank line
    #[cfg_attr(feature = "serde", serde(serialize_with = "lossy_text"))]
    pub body:      Vec<u8>,
}

impl HttpResponse {
    /// Sort headers by name, then value. The sort is stable and
    /// case-sensitive, so duplicates keep a deterministic order.
    pub fn sort_headers(&mut self) {
        self.headers.sort();
    }

    /// First header with the given name (ASCII case-insensitive)
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.is_named(name))
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = if self.code_text.is_empty() { "-" } else { &self.code_text };
        writeln!(f, "{} {} {}", self.version, code, self.status)?;
        write_head_and_body(f, &self.headers, &self.body)
    }
}

fn write_head_and_body(f: &mut fmt::Formatter<'_>, headers: &[Header], body: &[u8]) -> fmt::Result {
    for header in headers {
        writeln!(f, "{header}")?;
    }
    if !body.is_empty() {
        writeln!(f)?;
        writeln!(f, "{}", String::from_utf8_lossy(body))?;
    }
    Ok(())
}

/// A parsed message, classified by the direction its buffer traveled
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum HttpMessage {
    Request(HttpRequest),
    Response(HttpResponse),
}

impl HttpMessage {
    /// Returns true if this is a request
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// Returns true if this is a response
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    /// Get the request if this is a request, None otherwise
    pub fn as_request(&self) -> Option<&HttpRequest> {
        match self {
            Self::Request(req) => Some(req),
            Self::Response(_) => None,
        }
    }

    /// Get the response if this is a response, None otherwise
    pub fn as_response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Request(_) => None,
            Self::Response(resp) => Some(resp),
        }
    }
}

impl fmt::Display for HttpMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(req) => write!(f, "{req}"),
            Self::Response(resp) => write!(f, "{resp}"),
        }
    }
}

#[cfg(feature = "serde")]
fn lossy_text<S: serde::Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

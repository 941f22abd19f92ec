//! HTTP exchange (request/response pair) extracted from a flow

use std::fmt;

use h1wire::{HttpMessage, HttpRequest, HttpResponse};

use crate::connection::FlowKey;

/// The captured request and response of one flow
#[derive(Debug, Clone)]
pub struct Exchange {
    pub key:      FlowKey,
    pub request:  HttpRequest,
    pub response: HttpResponse,
}

impl Exchange {
    /// Pair the first two messages of a flow.
    ///
    /// Only one exchange per connection is supported: anything after the
    /// first response is ignored, and flows that do not start with a request
    /// followed by a response yield `None`.
    pub fn from_messages(key: FlowKey, mut messages: impl Iterator<Item = HttpMessage>) -> Option<Self> {
        let first = messages.next()?;
        let second = messages.next()?;
        match (first, second) {
            (HttpMessage::Request(request), HttpMessage::Response(response)) => Some(Self {
                key,
                request,
                response,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Exchange {} ===", self.key)?;
        writeln!(f, "--- Request ---")?;
        write!(f, "{}", self.request)?;
        writeln!(f, "--- Response ---")?;
        write!(f, "{}", self.response)
    }
}

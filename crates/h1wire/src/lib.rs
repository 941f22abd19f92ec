// HTTP/1.x message crate
// Parses single captured messages without framing guarantees and writes
// requests back to wire form

mod http_types;
mod parse;

#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}
pub(crate) use trace_warn;

pub use http_types::{Header, HttpMessage, HttpRequest, HttpResponse};
pub use parse::{is_http1_request, is_http1_response, parse_request, parse_response};

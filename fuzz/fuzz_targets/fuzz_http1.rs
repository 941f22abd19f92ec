//! Fuzz target: HTTP/1.x parsing
//!
//! Feeds random bytes to the request and response parsers. They must never
//! panic, and a request's body is always a suffix of its input.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let request = h1wire::parse_request(data);
    assert!(data.ends_with(&request.body));
    let _ = request.to_wire();

    let response = h1wire::parse_response(data);
    assert!(data.ends_with(&response.body));

    let _ = h1wire::is_http1_request(data);
    let _ = h1wire::is_http1_response(data);

    // Prefix of data, as if the capture were cut short
    if data.len() > 10 {
        let _ = h1wire::parse_request(&data[..data.len() / 2]);
        let _ = h1wire::parse_response(&data[..data.len() / 2]);
    }
});

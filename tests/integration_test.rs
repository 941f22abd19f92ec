//! End-to-end tests: capture file to replayed comparison

mod fixtures;

use fixtures::*;
use h1wire::HttpResponse;
use httpreplay::{
    CaptureFlows, DumpFormat, Mismatch, ReplayConfig, ReplayEngine, ReplayOutcome, ReplayStats, ResponseComparator,
    dump_flows, open_captures,
};

fn replay_captures(files: &[&tempfile::NamedTempFile], engine: &ReplayEngine) -> (Vec<ReplayOutcome>, ReplayStats) {
    let paths: Vec<_> = files.iter().map(|f| f.path()).collect();
    let flows = CaptureFlows::new(open_captures(&paths).unwrap(), ReplayConfig::default().assembler());
    let mut replay = engine.replay(flows);
    let outcomes: Vec<_> = replay.by_ref().collect();
    (outcomes, replay.stats())
}

fn two_page_capture() -> tempfile::NamedTempFile {
    Capture::new()
        .exchange(40001, &request("/a"), &response("Mon", "alpha"))
        .exchange(40002, &request("/b"), &response("Mon", "beta"))
        .write()
}

#[test]
fn test_identical_server_matches_everything() {
    let capture = two_page_capture();
    let (target, server) = serve(2, |line| {
        // Fresh Date header, same content
        let body = if line.contains("/a") { "alpha" } else { "beta" };
        response("Tue", body)
    });

    let engine = ReplayEngine::from_config(target, &ReplayConfig::default());
    let (outcomes, stats) = replay_captures(&[&capture], &engine);

    assert_eq!(stats, ReplayStats { attempted: 2, matched: 2 });
    assert!(outcomes.iter().all(ReplayOutcome::is_match));
    assert_eq!(server.join().unwrap(), vec!["GET /a HTTP/1.1", "GET /b HTTP/1.1"]);
}

#[test]
fn test_divergent_body_is_reported() {
    let capture = two_page_capture();
    let (target, server) = serve(2, |line| {
        let body = if line.contains("/a") { "alpha" } else { "BETA" };
        response("Mon", body)
    });

    let engine = ReplayEngine::from_config(target, &ReplayConfig::default());
    let (outcomes, stats) = replay_captures(&[&capture], &engine);
    server.join().unwrap();

    assert_eq!(stats, ReplayStats { attempted: 2, matched: 1 });
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_match()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].request.target, "/b");
    assert!(matches!(failed[0].comparison.mismatch, Some(Mismatch::Body { .. })));
}

#[test]
fn test_limit_stops_early() {
    let capture = two_page_capture();
    let (target, server) = serve(1, |_| response("Mon", "alpha"));

    let config = ReplayConfig {
        limit: Some(1),
        ..ReplayConfig::default()
    };
    let engine = ReplayEngine::from_config(target, &config);
    let (outcomes, stats) = replay_captures(&[&capture], &engine);

    assert_eq!(outcomes.len(), 1);
    assert_eq!(stats, ReplayStats { attempted: 1, matched: 1 });
    assert_eq!(server.join().unwrap().len(), 1);
}

#[test]
fn test_zero_limit_replays_nothing() {
    let capture = two_page_capture();
    let (target, server) = serve(0, |_| response("Mon", "alpha"));

    let config = ReplayConfig {
        limit: Some(0),
        ..ReplayConfig::default()
    };
    let engine = ReplayEngine::from_config(target, &config);
    let (outcomes, stats) = replay_captures(&[&capture], &engine);

    assert!(outcomes.is_empty());
    assert_eq!(stats, ReplayStats { attempted: 0, matched: 0 });
    assert!(server.join().unwrap().is_empty());
}

fn timestamp_capture() -> tempfile::NamedTempFile {
    Capture::new()
        .exchange(40011, &request("/a"), &response("Mon", "rendered at 1111"))
        .exchange(40012, &request("/b"), &response("Mon", "rendered at 1112"))
        .write()
}

/// Blanks the digits of the body, leaving its length unchanged
fn mask_digits(mut resp: HttpResponse) -> HttpResponse {
    for b in resp.body.iter_mut().filter(|b| b.is_ascii_digit()) {
        *b = b'#';
    }
    resp
}

#[test]
fn test_varying_token_mismatches_without_transform() {
    let capture = timestamp_capture();
    let (target, server) = serve(2, |_| response("Mon", "rendered at 2222"));

    let engine = ReplayEngine::from_config(target, &ReplayConfig::default());
    let (outcomes, stats) = replay_captures(&[&capture], &engine);
    server.join().unwrap();

    assert_eq!(stats, ReplayStats { attempted: 2, matched: 0 });
    assert!(outcomes.iter().all(|o| matches!(o.comparison.mismatch, Some(Mismatch::Body { .. }))));
}

#[test]
fn test_engine_comparator_transform_masks_varying_token() {
    let capture = timestamp_capture();
    let (target, server) = serve(2, |_| response("Mon", "rendered at 2222"));

    let config = ReplayConfig::default();
    let comparator = ResponseComparator::new(config.compare_policy()).with_transform(mask_digits);
    let engine = ReplayEngine::from_config(target, &config).with_comparator(comparator);
    let (outcomes, stats) = replay_captures(&[&capture], &engine);
    server.join().unwrap();

    assert_eq!(stats, ReplayStats { attempted: 2, matched: 2 });
    // The transformed responses are what got compared
    assert_eq!(outcomes[0].comparison.replayed.body, b"rendered at ####");
    assert_eq!(outcomes[0].comparison.original.body, b"rendered at ####");
}

#[test]
fn test_unreachable_target_fails_every_request() {
    let capture = two_page_capture();
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let config = ReplayConfig {
        connect_timeout_ms: 500,
        read_timeout_ms: 500,
        ..ReplayConfig::default()
    };
    let engine = ReplayEngine::from_config(httpreplay::Target::new("127.0.0.1", port), &config);
    let (outcomes, stats) = replay_captures(&[&capture], &engine);

    assert_eq!(stats, ReplayStats { attempted: 2, matched: 0 });
    assert!(outcomes.iter().all(|o| o.comparison.replayed.code.is_none()));
}

#[test]
fn test_files_are_assembled_independently() {
    // First file ends mid-connection; the second continues with the same
    // endpoints but no SYN, so nothing from it joins the first flow
    let mut first = Capture::new();
    first.handshake(40003).client(40003, PSH_ACK, &request("/cut"));
    let first = first.write();

    let mut second = Capture::new();
    second
        .server(40003, PSH_ACK, &response("Mon", "late"))
        .server(40003, FIN_ACK, b"")
        .exchange(40004, &request("/whole"), &response("Mon", "whole"));
    let second = second.write();

    let (target, server) = serve(1, |_| response("Mon", "whole"));
    let engine = ReplayEngine::from_config(target, &ReplayConfig::default());
    let (outcomes, stats) = replay_captures(&[&first, &second], &engine);
    server.join().unwrap();

    assert_eq!(stats, ReplayStats { attempted: 1, matched: 1 });
    assert_eq!(outcomes[0].request.target, "/whole");
}

#[test]
fn test_reset_and_unanswered_flows_are_skipped() {
    let mut capture = Capture::new();
    capture
        .handshake(40005)
        .client(40005, PSH_ACK, &request("/reset"))
        .client(40005, RST, b"")
        .handshake(40006)
        .client(40006, PSH_ACK, &request("/unanswered"))
        .client(40006, FIN_ACK, b"")
        .exchange(40007, &request("/ok"), &response("Mon", "ok"));
    let capture = capture.write();

    let (target, server) = serve(1, |_| response("Mon", "ok"));
    let engine = ReplayEngine::from_config(target, &ReplayConfig::default());

    let flows = CaptureFlows::new(open_captures(&[capture.path()]).unwrap(), ReplayConfig::default().assembler());
    let mut replay = engine.replay(flows);
    let outcomes: Vec<_> = replay.by_ref().collect();
    server.join().unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].request.target, "/ok");
    assert_eq!(replay.skipped(), 1);
}

#[test]
fn test_dump_lists_every_message() {
    let capture = two_page_capture();
    let flows = CaptureFlows::new(open_captures(&[capture.path()]).unwrap(), ReplayConfig::default().assembler());

    let mut out = Vec::new();
    assert_eq!(dump_flows(flows, &mut out, DumpFormat::Json).unwrap(), 2);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert!(text.contains("\"target\":\"/a\""));
    assert!(text.contains("\"body\":\"beta\""));
}

#[test]
fn test_missing_capture_is_fatal() {
    let capture = two_page_capture();
    let result = open_captures(&[capture.path(), std::path::Path::new("/nonexistent/x.pcap")]);
    assert!(matches!(result, Err(httpreplay::Error::Pcap(_))));
}

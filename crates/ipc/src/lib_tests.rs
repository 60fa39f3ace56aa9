// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::io::Cursor;
use yare::parameterized;

fn summary() -> PassSummary {
    PassSummary {
        attempted: 3,
        completed: 2,
        retried: 1,
        failed: 0,
        deferred: 1,
        store_errors: 0,
        skipped: 0,
        context: ExecutionContext::Background,
        finished_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
    }
}

#[parameterized(
    register = { SyncRequest::RegisterSync { tag: "pos-sync".into() }, "REGISTER_SYNC" },
    force = { SyncRequest::ForceSync, "FORCE_SYNC" },
    status = { SyncRequest::GetSyncStatus, "GET_SYNC_STATUS" },
    watch = { SyncRequest::WatchEvents, "WATCH_EVENTS" },
    ping = { SyncRequest::Ping, "PING" },
    shutdown = { SyncRequest::Shutdown, "SHUTDOWN" },
    hello = { SyncRequest::Hello { version: "0.4.0".into() }, "HELLO" },
)]
fn request_type_tag_matches_wire_name(request: SyncRequest, tag: &str) {
    let json: serde_json::Value = serde_json::to_value(&request).unwrap();
    assert_eq!(json["type"], tag);
    assert_eq!(request.name(), tag);
    let parsed: SyncRequest = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, request);
}

#[test]
fn request_parses_from_envelope() {
    let parsed: SyncRequest =
        serde_json::from_str(r#"{"type":"REGISTER_SYNC","tag":"offline-queue"}"#).unwrap();
    assert_eq!(
        parsed,
        SyncRequest::RegisterSync {
            tag: "offline-queue".into()
        }
    );
}

#[parameterized(
    registered = { SyncResponse::Registered { tags: vec!["a".into()] } },
    complete = { SyncResponse::SyncComplete(summary()) },
    failed = { SyncResponse::SyncFailed { error: "offline".into() } },
    status = { SyncResponse::SyncStatus(StatusSnapshot::fallback(true, "timed out")) },
    event = { SyncResponse::Event { event: SyncEvent::PassCompleted(summary()) } },
    connectivity = { SyncResponse::Event { event: SyncEvent::ConnectivityChanged { is_online: false } } },
    pong = { SyncResponse::Pong },
    error = { SyncResponse::Error { message: "bad".into() } },
)]
fn response_framing_round_trip(response: SyncResponse) {
    let mut buf = Vec::new();
    framing::write_message(&mut buf, &response).unwrap();
    let parsed: SyncResponse = framing::read_message(&mut Cursor::new(buf)).unwrap();
    assert_eq!(parsed, response);
}

#[test]
fn framing_prefixes_big_endian_length() {
    let mut buf = Vec::new();
    framing::write_message(&mut buf, &SyncRequest::Ping).unwrap();
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    assert_eq!(len, buf.len() - 4);
}

#[test]
fn framing_rejects_oversized_length() {
    let mut buf = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes().to_vec();
    buf.extend_from_slice(b"{}");
    let err = framing::read_message::<_, SyncRequest>(&mut Cursor::new(buf)).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn framing_reports_truncated_message() {
    let mut buf = Vec::new();
    framing::write_message(&mut buf, &SyncRequest::ForceSync).unwrap();
    buf.truncate(buf.len() - 2);
    let err = framing::read_message::<_, SyncRequest>(&mut Cursor::new(buf)).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn async_framing_matches_blocking_wire_format() {
    let mut blocking = Vec::new();
    framing::write_message(&mut blocking, &SyncRequest::GetSyncStatus).unwrap();

    let mut asynchronous = Vec::new();
    framing_async::write_message(&mut asynchronous, &SyncRequest::GetSyncStatus)
        .await
        .unwrap();
    assert_eq!(blocking, asynchronous);

    let mut reader = asynchronous.as_slice();
    let parsed: SyncRequest = framing_async::read_message(&mut reader).await.unwrap();
    assert_eq!(parsed, SyncRequest::GetSyncStatus);
}

#[test]
fn summary_clean_only_without_retries_or_deferrals() {
    let mut s = summary();
    assert!(!s.is_clean());
    s.retried = 0;
    s.deferred = 0;
    assert!(s.is_clean());
    s.store_errors = 1;
    assert!(!s.is_clean());
}

#[test]
fn summary_display() {
    assert_eq!(
        summary().to_string(),
        "background pass: 3 attempted, 2 completed, 1 retried, 0 failed, 1 deferred"
    );
}

#[test]
fn status_fallback_is_zero_pending() {
    let snapshot = StatusSnapshot::fallback(false, "background context unavailable");
    assert_eq!(snapshot.pending_operations, 0);
    assert!(!snapshot.is_online);
    assert!(snapshot.error.is_some());
    let json = serde_json::to_value(&snapshot).unwrap();
    assert!(json.get("last_sync").is_none());
}

#[parameterized(
    foreground = { "foreground", ExecutionContext::Foreground },
    background = { "BACKGROUND", ExecutionContext::Background },
)]
fn context_from_str(input: &str, expected: ExecutionContext) {
    assert_eq!(input.parse::<ExecutionContext>().unwrap(), expected);
}

#[test]
fn context_from_str_rejects_unknown() {
    assert!("worker".parse::<ExecutionContext>().is_err());
}

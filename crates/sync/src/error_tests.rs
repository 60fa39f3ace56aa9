// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    offline = { Error::Offline, "needs connectivity" },
    busy = { Error::DrainInProgress, "already in progress" },
    timeout = { Error::ContextTimeout { request: "FORCE_SYNC", after: Duration::from_secs(30) }, "FORCE_SYNC timed out after 30s" },
    unavailable = { Error::ContextUnavailable("connection refused".into()), "connection refused" },
    protocol = { Error::Protocol("unexpected PONG".into()), "unexpected PONG" },
    config = { Error::Config("bad url".into()), "bad url" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected), "{err}");
}

#[test]
fn error_from_store() {
    let err: Error = till_core::Error::OperationNotFound("op-1".into()).into();
    assert!(matches!(
        err,
        Error::Store(till_core::Error::OperationNotFound(_))
    ));
}

#[test]
fn error_from_io() {
    let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, Error::Io(_)));
}

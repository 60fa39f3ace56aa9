// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

mod common;
use common::*;

#[test]
fn enqueue_prints_operation_id() {
    let terminal = Terminal::offline();
    let id = terminal.enqueue("create", "sales", r#"{"id":"s1","total":12}"#);
    assert!(id.starts_with("op-"));
    assert_eq!(id.len(), "op-".len() + 16);
}

#[test]
fn enqueue_rejects_update_without_id() {
    let terminal = Terminal::offline();
    terminal
        .till()
        .args(["enqueue", "update", "products", r#"{"stock":3}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("needs an \"id\" field"));
}

#[test]
fn enqueue_rejects_unknown_type() {
    let terminal = Terminal::offline();
    terminal
        .till()
        .args(["enqueue", "upsert", "products", "{}"])
        .assert()
        .failure();
}

#[test]
fn queue_survives_between_invocations() {
    let terminal = Terminal::offline();
    terminal.enqueue("create", "sales", r#"{"id":"s1"}"#);
    terminal.enqueue("update", "sales", r#"{"id":"s1","total":3}"#);

    terminal
        .till()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Connection: offline"))
        .stdout(predicate::str::contains("Background: in-process"))
        .stdout(predicate::str::contains("Pending: 2"))
        .stdout(predicate::str::contains("Last sync: never"));
}

#[test]
fn status_json() {
    let terminal = Terminal::offline();
    terminal.enqueue("create", "sales", r#"{"id":"s1"}"#);

    let output = terminal
        .till()
        .args(["status", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["background"]["pending_operations"], 1);
    assert_eq!(value["connection"]["is_online"], false);
}

#[test]
fn sync_while_offline_fails_and_keeps_queue() {
    let terminal = Terminal::offline();
    terminal.enqueue("create", "sales", r#"{"id":"s1"}"#);

    terminal
        .till()
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("offline"));

    terminal
        .till()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pending: 1"));
}

#[test]
fn failed_is_empty_on_fresh_queue() {
    let terminal = Terminal::offline();
    terminal
        .till()
        .arg("failed")
        .assert()
        .success()
        .stdout("No failed operations\n");
}

#[test]
fn resubmit_unknown_operation_fails() {
    let terminal = Terminal::offline();
    terminal
        .till()
        .args(["resubmit", "op-0000000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("operation not found"));
}

#[test]
fn register_without_daemon_fails() {
    let terminal = Terminal::offline();
    terminal
        .till()
        .arg("register")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tilld is not running"));
}

#[test]
fn daemon_status_when_not_running() {
    let terminal = Terminal::offline();
    terminal
        .till()
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout("Status: not running\n");
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::commands::testing::TestContext;
use yare::parameterized;

#[parameterized(
    create_without_id = { OpType::Create, r#"{"total":12}"# },
    create_with_id = { OpType::Create, r#"{"id":"s1"}"# },
    update_string_id = { OpType::Update, r#"{"id":"p7","stock":3}"# },
    delete_numeric_id = { OpType::Delete, r#"{"id":42}"# },
)]
fn accepts_payload(op_type: OpType, raw: &str) {
    assert!(parse_payload(op_type, raw).is_ok());
}

#[parameterized(
    not_json = { OpType::Create, "total=12" },
    array = { OpType::Create, "[1,2]" },
    update_without_id = { OpType::Update, r#"{"stock":3}"# },
    delete_empty_id = { OpType::Delete, r#"{"id":""}"# },
)]
fn rejects_payload(op_type: OpType, raw: &str) {
    assert!(parse_payload(op_type, raw).is_err());
}

#[tokio::test]
async fn enqueue_prints_id_and_records_operation() {
    let ctx = TestContext::new();
    let mut out = Vec::new();

    run(
        &ctx.session,
        OpType::Create,
        " sales ",
        r#"{"id":"s1","total":12}"#,
        OutputFormat::Text,
        &mut out,
    )
    .await
    .unwrap();

    let id = String::from_utf8(out).unwrap().trim().to_string();
    assert!(id.starts_with("op-"));
    let pending = ctx.session.coordinator().pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(pending[0].entity_kind, "sales");
    assert_eq!(ctx.remote.call_count(), 0);
    ctx.close().await;
}

#[tokio::test]
async fn enqueue_json_output() {
    let ctx = TestContext::new();
    let mut out = Vec::new();

    run(
        &ctx.session,
        OpType::Delete,
        "customers",
        r#"{"id":"c2"}"#,
        OutputFormat::Json,
        &mut out,
    )
    .await
    .unwrap();

    let value: Value = serde_json::from_slice(&out).unwrap();
    assert!(value["id"].as_str().unwrap().starts_with("op-"));
    ctx.close().await;
}

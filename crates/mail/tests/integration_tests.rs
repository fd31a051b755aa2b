//! Integration tests for the graph-mail crate
//!
//! These tests drive the dispatcher end to end against a scripted transport,
//! from raw action lines to output records.

use graph_mail::graph::{Method, RequestBody};
use graph_mail::{
    ActionDispatcher, Credentials, GraphClient, OutputRecord, ReadAction, ScriptedTransport,
    TokenProvider,
};
use serde_json::{Value, json};
use std::sync::Arc;

fn dispatcher(transport: &Arc<ScriptedTransport>) -> ActionDispatcher {
    let tokens = Arc::new(TokenProvider::new(
        Credentials::new("tenant", "client", "secret"),
        transport.clone(),
    ));
    let graph = GraphClient::new(tokens, transport.clone(), "user@contoso.com");
    ActionDispatcher::new(Arc::new(graph))
}

fn push_token(transport: &ScriptedTransport, value: &str, expires_in: i64) {
    transport.push_json(200, &json!({"access_token": value, "expires_in": expires_in}));
}

/// A page of messages with ids `m{from}..m{to}`, newest first
fn page(from: usize, to: usize, next: Option<&str>) -> Value {
    let value: Vec<Value> = (from..to)
        .map(|i| {
            json!({
                "id": format!("m{}", i),
                "subject": format!("Message {}", i),
                "receivedDateTime": format!("2024-05-01T10:{:02}:00Z", 59 - i),
                "isRead": false
            })
        })
        .collect();
    match next {
        Some(link) => json!({"value": value, "@odata.nextLink": link}),
        None => json!({"value": value}),
    }
}

/// Run `lines` through a fresh dispatcher and serialize every output record
fn run(transport: &Arc<ScriptedTransport>, lines: &[&str]) -> Vec<Value> {
    let mut dispatcher = dispatcher(transport);
    let mut output = Vec::new();
    dispatcher
        .run(lines.iter().map(|l| Ok::<_, std::io::Error>(l.to_string())), |record| {
            output.push(serde_json::to_value(&record)?);
            Ok(())
        })
        .unwrap();
    output
}

#[test]
fn test_read_top_two_of_five() {
    let transport = Arc::new(ScriptedTransport::new());
    push_token(&transport, "tok-1", 3600);
    transport.push_json(200, &page(0, 5, None));

    let output = run(&transport, &[r#"{"action":"read","folder":"inbox","top":2}"#]);

    assert_eq!(output.len(), 2);
    assert_eq!(output[0]["id"], "m0");
    assert_eq!(output[1]["id"], "m1");
    assert_eq!(output[0]["subject"], "Message 0");
    assert_eq!(output[0]["isRead"], false);
}

#[test]
fn test_exact_top_across_pages_without_duplicates() {
    let transport = Arc::new(ScriptedTransport::new());
    push_token(&transport, "tok-1", 3600);
    transport
        .push_json(200, &page(0, 4, Some("https://graph.microsoft.com/v1.0/next/1")))
        .push_json(200, &page(4, 8, Some("https://graph.microsoft.com/v1.0/next/2")))
        .push_json(200, &page(8, 12, None));

    let output = run(&transport, &[r#"{"action":"read","top":10}"#]);

    let ids: Vec<&str> = output.iter().map(|v| v["id"].as_str().unwrap()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("m{}", i)).collect();
    assert_eq!(ids, expected);
    // token + three pages
    assert_eq!(transport.request_count(), 4);
}

#[test]
fn test_output_cardinality_and_order() {
    let transport = Arc::new(ScriptedTransport::new());
    push_token(&transport, "tok-1", 3600);
    transport
        .push_json(200, &page(0, 3, None))
        .push_json(201, &json!({"id": "m0-moved"}))
        .push(200, "{}")
        .push_json(200, &page(0, 1, None));

    let output = run(
        &transport,
        &[
            r#"{"action":"read","top":3}"#,
            r#"{"action":"move","mail":"m0","folder":"Archive"}"#,
            r#"{"action":"state","mail":"m1","isRead":true}"#,
            r#"{"action":"read","folder":"sentitems","top":1}"#,
        ],
    );

    // 3 emails + 1 move status + 1 state status + 1 email
    assert_eq!(output.len(), 6);
    assert_eq!(output[2]["id"], "m2");
    assert_eq!(output[3], json!({"success": true, "mailId": "m0"}));
    assert_eq!(output[4], json!({"success": true, "mailId": "m1"}));
    assert_eq!(output[5]["id"], "m0");
}

#[test]
fn test_state_on_missing_message_continues() {
    let transport = Arc::new(ScriptedTransport::new());
    push_token(&transport, "tok-1", 3600);
    transport
        .push_json(
            404,
            &json!({"error": {"code": "ErrorItemNotFound", "message": "The specified object was not found in the store."}}),
        )
        .push_json(200, &page(0, 1, None));

    let output = run(
        &transport,
        &[
            r#"{"action":"state","mail":"X","flagged":true}"#,
            r#"{"action":"read","top":1}"#,
        ],
    );

    assert_eq!(output.len(), 2);
    assert_eq!(output[0]["success"], false);
    assert_eq!(output[0]["mailId"], "X");
    let error = output[0]["error"].as_str().unwrap();
    assert!(error.starts_with("StateError:"));
    assert!(error.contains("ErrorItemNotFound"));
    assert_eq!(output[1]["id"], "m0");
}

#[test]
fn test_unknown_action_does_not_stop_stream() {
    let transport = Arc::new(ScriptedTransport::new());
    push_token(&transport, "tok-1", 3600);
    transport.push(200, "{}");

    let output = run(
        &transport,
        &[
            r#"{"action":"bogus"}"#,
            r#"{"action":"state","mail":"m1","flagged":false}"#,
        ],
    );

    assert_eq!(output.len(), 2);
    assert_eq!(output[0]["success"], false);
    assert!(output[0]["error"].as_str().unwrap().starts_with("UnknownActionError"));
    assert_eq!(output[1], json!({"success": true, "mailId": "m1"}));
}

#[test]
fn test_repeated_state_action_is_idempotent() {
    let transport = Arc::new(ScriptedTransport::new());
    push_token(&transport, "tok-1", 3600);
    transport.push(200, "{}").push(200, "{}");

    let line = r#"{"action":"state","mail":"m1","flagged":true}"#;
    let output = run(&transport, &[line, line]);

    assert_eq!(output[0], output[1]);
    assert_eq!(output[0]["success"], true);

    let requests = transport.requests();
    assert_eq!(requests[1].method, Method::Patch);
    assert_eq!(requests[1].body, requests[2].body);
    assert_eq!(
        requests[1].body,
        RequestBody::Json(json!({"flag": {"flagStatus": "flagged"}}))
    );
}

#[test]
fn test_single_token_exchange_within_validity_window() {
    let transport = Arc::new(ScriptedTransport::new());
    push_token(&transport, "tok-1", 3600);
    transport.push(200, "{}").push_json(201, &json!({}));

    run(
        &transport,
        &[
            r#"{"action":"state","mail":"m1","isRead":true}"#,
            r#"{"action":"move","mail":"m1","folder":"inbox"}"#,
        ],
    );

    let exchanges = transport
        .requests()
        .iter()
        .filter(|r| r.url.contains("/oauth2/v2.0/token"))
        .count();
    assert_eq!(exchanges, 1);
    assert!(transport.requests()[1..].iter().all(|r| r.bearer.as_deref() == Some("tok-1")));
}

#[test]
fn test_expiring_token_is_refreshed_between_actions() {
    let transport = Arc::new(ScriptedTransport::new());
    // 30s lifetime is inside the refresh margin, so every call re-exchanges
    push_token(&transport, "tok-1", 30);
    transport.push(200, "{}");
    push_token(&transport, "tok-2", 3600);
    transport.push(200, "{}");

    let output = run(
        &transport,
        &[
            r#"{"action":"state","mail":"m1","isRead":true}"#,
            r#"{"action":"state","mail":"m2","isRead":true}"#,
        ],
    );

    assert_eq!(output.len(), 2);
    let requests = transport.requests();
    assert_eq!(requests[1].bearer.as_deref(), Some("tok-1"));
    assert_eq!(requests[3].bearer.as_deref(), Some("tok-2"));
}

#[test]
fn test_read_failure_keeps_partial_results_and_marks_failure() {
    let transport = Arc::new(ScriptedTransport::new());
    push_token(&transport, "tok-1", 3600);
    transport
        .push_json(200, &page(0, 2, Some("https://graph.microsoft.com/v1.0/next/1")))
        .push_json(503, &json!({"error": {"code": "ServiceUnavailable", "message": "try later"}}))
        .push(200, "{}");

    let output = run(
        &transport,
        &[
            r#"{"action":"read","top":5}"#,
            r#"{"action":"state","mail":"m0","isRead":true}"#,
        ],
    );

    assert_eq!(output.len(), 4);
    assert_eq!(output[0]["id"], "m0");
    assert_eq!(output[1]["id"], "m1");
    assert_eq!(
        output[2],
        json!({
            "success": false,
            "folder": "inbox",
            "error": "ApiError: status 503: ServiceUnavailable: try later"
        })
    );
    assert_eq!(output[3]["success"], true);
}

#[test]
fn test_auth_failure_aborts_run() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(400, &json!({"error": "invalid_request", "error_description": "AADSTS90002: Tenant not found"}));

    let mut dispatcher = dispatcher(&transport);
    let mut output: Vec<OutputRecord> = Vec::new();
    let err = dispatcher
        .run(
            [r#"{"action":"read"}"#, r#"{"action":"bogus"}"#]
                .into_iter()
                .map(|l| Ok::<_, std::io::Error>(l.to_string())),
            |record| {
                output.push(record);
                Ok(())
            },
        )
        .unwrap_err();

    assert!(err.to_string().contains("AADSTS90002"));
    assert!(output.is_empty());
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_legacy_read_emits_configured_batch() {
    let transport = Arc::new(ScriptedTransport::new());
    push_token(&transport, "tok-1", 3600);
    transport.push_json(200, &page(0, 3, None));

    let mut dispatcher = dispatcher(&transport);
    let mut output = Vec::new();
    let summary = dispatcher
        .run_legacy(
            &ReadAction::new("JunkEmail", 3, Some("isRead eq false".to_string())),
            |record| {
                output.push(record);
                Ok(())
            },
        )
        .unwrap();

    assert_eq!(output.len(), 3);
    assert_eq!(summary.emails, 3);
    assert!(transport.requests()[1].url.contains("/mailFolders/junkemail/messages"));
}

#[test]
fn test_legacy_read_with_zero_top_makes_no_graph_calls() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut dispatcher = dispatcher(&transport);
    let mut output = Vec::new();

    dispatcher
        .run_legacy(&ReadAction::new("inbox", 0, None), |record| {
            output.push(record);
            Ok(())
        })
        .unwrap();

    assert!(output.is_empty());
    assert_eq!(transport.request_count(), 0);
}

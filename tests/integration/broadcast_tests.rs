//! Integration tests for broadcast scoping and connection identifiers.

use std::time::Duration;

use agent_bridge::jsonrpc::Message;
use serde_json::json;

use super::test_helpers::{post, start_server, wait_until, RecordingHandler, StreamClient};

#[tokio::test]
async fn broadcast_reaches_streams_only() {
    let handler = RecordingHandler::silent();
    let server = start_server(handler.clone()).await;

    let mut stream = StreamClient::open(server.port()).await;
    assert!(wait_until(|| server.stream_ids().len() == 1).await);

    let response = post(server.port(), r#"{"method":"tools/list"}"#).await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(wait_until(|| server.connection_count() == 1).await);

    let note = Message::notification("notifications/changed", Some(json!({ "rev": 3 })));
    assert_eq!(server.broadcast_to_streams(&note), 1);

    let event = stream.next_event().await.expect("stream receives broadcast");
    assert_eq!(event["method"], "notifications/changed");
    assert_eq!(event["params"]["rev"], 3);
    assert!(
        !response.contains("notifications/changed"),
        "closed request connection must never observe the broadcast"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn broadcast_without_streams_delivers_nothing() {
    let server = start_server(RecordingHandler::silent()).await;

    let note = Message::notification("notifications/changed", None);
    assert_eq!(server.broadcast_to_streams(&note), 0);
    assert!(!server.send_to_last_stream(&note));

    server.shutdown().await;
}

#[tokio::test]
async fn broadcast_reaches_every_stream() {
    let server = start_server(RecordingHandler::silent()).await;

    let mut first = StreamClient::open(server.port()).await;
    let mut second = StreamClient::open(server.port()).await;
    assert!(wait_until(|| server.stream_ids().len() == 2).await);

    let note = Message::notification("notifications/all", None);
    assert_eq!(server.broadcast_to_streams(&note), 2);

    assert_eq!(first.next_event().await.expect("first")["method"], "notifications/all");
    assert_eq!(second.next_event().await.expect("second")["method"], "notifications/all");

    server.shutdown().await;
}

#[tokio::test]
async fn identifiers_increase_and_last_stream_is_newest() {
    let server = start_server(RecordingHandler::silent()).await;

    let mut older = StreamClient::open(server.port()).await;
    assert!(wait_until(|| server.stream_ids().len() == 1).await);
    let mut newer = StreamClient::open(server.port()).await;
    assert!(wait_until(|| server.stream_ids().len() == 2).await);

    let ids = server.stream_ids();
    assert!(ids[0] < ids[1], "ids must be strictly increasing: {ids:?}");
    assert!(ids[0].get() >= 1);

    let note = Message::notification("notifications/latest", None);
    assert!(server.send_to_last_stream(&note));

    let event = newer.next_event().await.expect("newest stream receives");
    assert_eq!(event["method"], "notifications/latest");
    assert!(
        older
            .next_event_within(Duration::from_millis(200))
            .await
            .is_none(),
        "older stream must not receive the targeted message"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn identifiers_are_never_reused() {
    let server = start_server(RecordingHandler::silent()).await;

    let first = StreamClient::open(server.port()).await;
    assert!(wait_until(|| server.stream_ids().len() == 1).await);
    let first_id = server.stream_ids()[0];
    drop(first);
    assert!(wait_until(|| server.connection_count() == 0).await);

    let _second = StreamClient::open(server.port()).await;
    assert!(wait_until(|| server.stream_ids().len() == 1).await);
    assert!(server.stream_ids()[0] > first_id);

    server.shutdown().await;
}

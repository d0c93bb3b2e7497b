// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervisor loop tests against an in-process websocket relay.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use zapgate_relay::{IncomingEvent, RelayPool, SupervisorConfig};
use zapgate_core::EventPublisher;
use zapgate_proto::{Event, EventDraft, EventKind, Filter, Tag};

fn fast_config() -> SupervisorConfig {
    SupervisorConfig {
        connect_timeout: Duration::from_secs(2),
        backoff_base: Duration::from_millis(10),
        backoff_ceiling: Duration::from_millis(50),
        max_reconnect_attempts: 2,
        startup_window: Duration::from_secs(2),
    }
}

fn sample_event(content: &str) -> Event {
    EventDraft::new(
        "aa".repeat(32),
        1_700_000_000,
        EventKind::Text,
        vec![Tag::pubkey("bb".repeat(32))],
        content,
    )
    .into_event("00".repeat(64))
}

#[tokio::test]
async fn subscribes_and_forwards_events_to_dispatcher_channel() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let event = sample_event("from the relay");
    let event_json = serde_json::to_string(&event).unwrap();

    // Minimal relay: expect a REQ, answer with one EVENT, stay open.
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let req = ws.next().await.unwrap().unwrap();
        let req_text = req.to_text().unwrap().to_string();
        assert!(req_text.starts_with(r#"["REQ""#), "got: {req_text}");
        let parsed: serde_json::Value = serde_json::from_str(&req_text).unwrap();
        let sub_id = parsed[1].as_str().unwrap().to_string();

        ws.send(Message::Text(format!(
            r#"["EVENT","{sub_id}",{event_json}]"#
        )))
        .await
        .unwrap();

        // Hold the connection open until the client goes away.
        while ws.next().await.is_some() {}
    });

    let pool = RelayPool::new(&[url.clone()], fast_config());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<IncomingEvent>();
    let cancel = CancellationToken::new();

    pool.start(
        vec![Filter::addressed_to("bb".repeat(32), 0)],
        events_tx,
        cancel.clone(),
    )
    .await
    .unwrap();

    let incoming = tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(incoming.event.id, event.id);
    assert_eq!(incoming.relay_url, url);

    let statuses = pool.statuses().await;
    assert!(statuses[0].connected);
    assert_eq!(statuses[0].messages_in, 1);
    assert_eq!(statuses[0].reconnect_attempts, 0);

    cancel.cancel();
}

#[tokio::test]
async fn publish_fans_out_to_connected_relay() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let (got_event_tx, got_event_rx) = oneshot::channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        // First frame is the subscription.
        let _req = ws.next().await.unwrap().unwrap();

        // Second frame should be the published event.
        let published = ws.next().await.unwrap().unwrap();
        let _ = got_event_tx.send(published.to_text().unwrap().to_string());

        while ws.next().await.is_some() {}
    });

    let pool = RelayPool::new(&[url], fast_config());
    let (events_tx, _events_rx) = mpsc::unbounded_channel::<IncomingEvent>();
    let cancel = CancellationToken::new();

    pool.start(vec![Filter::default()], events_tx, cancel.clone())
        .await
        .unwrap();

    let event = sample_event("outbound");
    pool.publish(event.clone()).await.unwrap();

    let wire = tokio::time::timeout(Duration::from_secs(2), got_event_rx)
        .await
        .unwrap()
        .unwrap();
    assert!(wire.starts_with(r#"["EVENT",{"#), "got: {wire}");
    assert!(wire.contains(&event.id));

    assert_eq!(pool.statuses().await[0].messages_out, 1);
    cancel.cancel();
}

#[tokio::test]
async fn unreachable_relay_becomes_permanently_failed() {
    // Bind then drop so the port is very likely refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = SupervisorConfig {
        startup_window: Duration::from_millis(500),
        ..fast_config()
    };
    let pool = RelayPool::new(&[url], config);
    let (events_tx, _events_rx) = mpsc::unbounded_channel::<IncomingEvent>();
    let cancel = CancellationToken::new();

    // Startup fails: no relay ever connects.
    let result = pool
        .start(vec![Filter::default()], events_tx, cancel.clone())
        .await;
    assert!(result.is_err());

    // Give the loop time to burn through its two attempts.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let status = &pool.statuses().await[0];
    assert!(status.permanently_failed);
    assert!(status.reconnect_attempts >= 2);
    assert!(status.errors >= 2);

    cancel.cancel();
}

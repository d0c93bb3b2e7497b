// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The relay supervisor: one subscription loop per relay URL.
//!
//! Each loop connects, subscribes with the standing filters, and streams
//! frames. On stream loss it reconnects with `min(base * 2^n, ceiling)`
//! backoff; event reception resets the attempt counter; exhausting the
//! attempt budget marks the relay permanently failed and exits its loop.
//! A relay's failure never blocks the others; startup requires at least
//! one relay to connect within the startup window.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use zapgate_core::{EventPublisher, GatewayError};
use zapgate_proto::{ClientFrame, Event, Filter, RelayFrame};

use crate::state::RelayStatus;

/// Reconnect policy and startup tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub connect_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_ceiling: Duration,
    pub max_reconnect_attempts: u32,
    pub startup_window: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_secs(5),
            backoff_ceiling: Duration::from_secs(60),
            max_reconnect_attempts: 5,
            startup_window: Duration::from_secs(30),
        }
    }
}

/// An event as received from a relay, tagged with its origin.
#[derive(Debug, Clone)]
pub struct IncomingEvent {
    pub event: Event,
    pub relay_url: String,
}

struct RelayHandle {
    url: String,
    status: RwLock<RelayStatus>,
    outgoing_tx: mpsc::UnboundedSender<Message>,
    outgoing_rx: Mutex<mpsc::UnboundedReceiver<Message>>,
}

impl RelayHandle {
    fn new(url: String) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        Self {
            status: RwLock::new(RelayStatus::new(url.clone())),
            url,
            outgoing_tx,
            outgoing_rx: Mutex::new(outgoing_rx),
        }
    }
}

/// Owns the per-relay loops and fans published events out to all of them.
pub struct RelayPool {
    handles: Vec<Arc<RelayHandle>>,
    config: SupervisorConfig,
    connected_tx: Arc<watch::Sender<bool>>,
    connected_rx: watch::Receiver<bool>,
}

impl RelayPool {
    pub fn new(urls: &[String], config: SupervisorConfig) -> Self {
        let handles = urls
            .iter()
            .map(|url| Arc::new(RelayHandle::new(url.clone())))
            .collect();
        let (connected_tx, connected_rx) = watch::channel(false);
        Self {
            handles,
            config,
            connected_tx: Arc::new(connected_tx),
            connected_rx,
        }
    }

    /// Spawns one subscription loop per relay and waits for the first
    /// connection. Fails when no relay connects within the startup window.
    pub async fn start(
        &self,
        filters: Vec<Filter>,
        events_tx: mpsc::UnboundedSender<IncomingEvent>,
        cancel: CancellationToken,
    ) -> Result<(), GatewayError> {
        for handle in &self.handles {
            tokio::spawn(run_relay_loop(
                handle.clone(),
                filters.clone(),
                events_tx.clone(),
                self.config.clone(),
                cancel.clone(),
                self.connected_tx.clone(),
            ));
        }

        let mut rx = self.connected_rx.clone();
        let connected = timeout(self.config.startup_window, rx.wait_for(|c| *c)).await;
        match connected {
            Ok(Ok(_)) => Ok(()),
            _ => Err(GatewayError::Relay {
                message: format!(
                    "no relay connected within {:?}",
                    self.config.startup_window
                ),
                source: None,
            }),
        }
    }

    /// Snapshot of every relay's state.
    pub async fn statuses(&self) -> Vec<RelayStatus> {
        let mut out = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            out.push(handle.status.read().await.clone());
        }
        out
    }
}

#[async_trait::async_trait]
impl EventPublisher for RelayPool {
    /// Hands the signed event to every live relay. At-least-once: succeeds
    /// when one or more relays took it.
    async fn publish(&self, event: Event) -> Result<(), GatewayError> {
        let frame = ClientFrame::Event(event).to_json();
        let mut accepted = 0usize;

        for handle in &self.handles {
            {
                let status = handle.status.read().await;
                if status.permanently_failed || !status.connected {
                    continue;
                }
            }
            if handle.outgoing_tx.send(Message::Text(frame.clone())).is_ok() {
                handle.status.write().await.messages_out += 1;
                accepted += 1;
            }
        }

        if accepted == 0 {
            return Err(GatewayError::PublishFailed);
        }
        debug!(relays = accepted, "event published");
        Ok(())
    }
}

/// Backoff before the `attempt`-th reconnect (0-based):
/// `min(base * 2^attempt, ceiling)`.
fn backoff_delay(config: &SupervisorConfig, attempt: u32) -> Duration {
    let doubled = config
        .backoff_base
        .saturating_mul(2u32.saturating_pow(attempt));
    doubled.min(config.backoff_ceiling)
}

async fn run_relay_loop(
    handle: Arc<RelayHandle>,
    filters: Vec<Filter>,
    events_tx: mpsc::UnboundedSender<IncomingEvent>,
    config: SupervisorConfig,
    cancel: CancellationToken,
    connected_tx: Arc<watch::Sender<bool>>,
) {
    let url = handle.url.clone();
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match timeout(config.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((ws, _response))) => {
                info!(url = %url, "relay connected");
                {
                    let mut status = handle.status.write().await;
                    status.connected = true;
                }
                let _ = connected_tx.send(true);

                run_subscription(
                    &handle,
                    ws,
                    &filters,
                    &events_tx,
                    &cancel,
                    &mut attempts,
                )
                .await;

                handle.status.write().await.connected = false;
                if cancel.is_cancelled() {
                    info!(url = %url, "relay loop cancelled");
                    break;
                }
                warn!(url = %url, "relay stream ended");
            }
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "relay connect failed");
                handle.status.write().await.record_error(e.to_string());
            }
            Err(_elapsed) => {
                warn!(url = %url, timeout = ?config.connect_timeout, "relay connect timed out");
                handle
                    .status
                    .write()
                    .await
                    .record_error("connect timeout".to_string());
            }
        }

        attempts += 1;
        {
            let mut status = handle.status.write().await;
            status.reconnect_attempts = attempts;
            if attempts >= config.max_reconnect_attempts {
                status.permanently_failed = true;
                warn!(
                    url = %url,
                    attempts,
                    "reconnect budget exhausted, relay permanently failed"
                );
                return;
            }
        }

        let delay = backoff_delay(&config, attempts - 1);
        debug!(url = %url, attempt = attempts, delay = ?delay, "reconnecting after backoff");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => break,
        }
    }
}

/// Runs one connected subscription until the stream ends or cancellation.
async fn run_subscription(
    handle: &Arc<RelayHandle>,
    ws: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    filters: &[Filter],
    events_tx: &mpsc::UnboundedSender<IncomingEvent>,
    cancel: &CancellationToken,
    attempts: &mut u32,
) {
    let url = &handle.url;
    let (mut ws_tx, mut ws_rx) = ws.split();

    let req = ClientFrame::Req {
        sub_id: format!("zapgate-{}", std::process::id()),
        filters: filters.to_vec(),
    };
    if let Err(e) = ws_tx.send(Message::Text(req.to_json())).await {
        warn!(url = %url, error = %e, "failed to send subscription");
        handle.status.write().await.record_error(e.to_string());
        return;
    }

    let mut outgoing_rx = handle.outgoing_rx.lock().await;

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_text_frame(handle, &text, events_tx, attempts).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws_tx.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return;
                    }
                    Some(Ok(_)) => {
                        // Binary and pong frames carry nothing for us.
                    }
                    Some(Err(e)) => {
                        warn!(url = %url, error = %e, "relay stream error");
                        handle.status.write().await.record_error(e.to_string());
                        return;
                    }
                }
            }
            outbound = outgoing_rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if let Err(e) = ws_tx.send(msg).await {
                            warn!(url = %url, error = %e, "relay send failed");
                            handle.status.write().await.record_error(e.to_string());
                            return;
                        }
                    }
                    None => return,
                }
            }
            _ = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

async fn handle_text_frame(
    handle: &Arc<RelayHandle>,
    text: &str,
    events_tx: &mpsc::UnboundedSender<IncomingEvent>,
    attempts: &mut u32,
) {
    let url = &handle.url;
    match RelayFrame::parse(text) {
        Ok(RelayFrame::Event { event, .. }) => {
            // Successful event reception resets the reconnect budget.
            *attempts = 0;
            {
                let mut status = handle.status.write().await;
                status.messages_in += 1;
                status.reconnect_attempts = 0;
                status.last_seen_ms = Some(chrono_now_ms());
            }
            let _ = events_tx.send(IncomingEvent {
                event,
                relay_url: url.clone(),
            });
        }
        Ok(RelayFrame::Eose { sub_id }) => {
            debug!(url = %url, sub_id = %sub_id, "end of stored events");
        }
        Ok(RelayFrame::Ok {
            event_id,
            accepted,
            message,
        }) => {
            if accepted {
                debug!(url = %url, event_id = %event_id, "event accepted");
            } else {
                warn!(url = %url, event_id = %event_id, message = %message, "event rejected");
            }
        }
        Ok(RelayFrame::Closed { sub_id, message }) => {
            warn!(url = %url, sub_id = %sub_id, message = %message, "subscription closed by relay");
            handle
                .status
                .write()
                .await
                .record_error(format!("subscription closed: {message}"));
        }
        Ok(RelayFrame::Notice { message }) => {
            debug!(url = %url, message = %message, "relay notice");
        }
        Ok(RelayFrame::Unknown { label }) => {
            debug!(url = %url, label = %label, "ignoring unhandled frame type");
        }
        Err(e) => {
            debug!(url = %url, error = %e, "dropping malformed frame");
        }
    }
}

fn chrono_now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(base_ms: u64, ceiling_ms: u64) -> SupervisorConfig {
        SupervisorConfig {
            backoff_base: Duration::from_millis(base_ms),
            backoff_ceiling: Duration::from_millis(ceiling_ms),
            ..SupervisorConfig::default()
        }
    }

    #[test]
    fn backoff_doubles_up_to_ceiling() {
        let config = config_with(5_000, 60_000);
        assert_eq!(backoff_delay(&config, 0), Duration::from_secs(5));
        assert_eq!(backoff_delay(&config, 1), Duration::from_secs(10));
        assert_eq!(backoff_delay(&config, 2), Duration::from_secs(20));
        assert_eq!(backoff_delay(&config, 3), Duration::from_secs(40));
        assert_eq!(backoff_delay(&config, 4), Duration::from_secs(60));
        // Capped from here on.
        assert_eq!(backoff_delay(&config, 10), Duration::from_secs(60));
        assert_eq!(backoff_delay(&config, 63), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn publish_with_no_live_relay_fails() {
        let pool = RelayPool::new(
            &["ws://127.0.0.1:1".to_string()],
            SupervisorConfig::default(),
        );
        let event = zapgate_proto::EventDraft::new(
            "author",
            1,
            zapgate_proto::EventKind::Text,
            vec![],
            "hi",
        )
        .into_event(String::new());

        let result = pool.publish(event).await;
        assert!(matches!(result, Err(GatewayError::PublishFailed)));
    }

    #[tokio::test]
    async fn statuses_reports_every_configured_relay() {
        let urls = vec![
            "ws://127.0.0.1:1".to_string(),
            "ws://127.0.0.1:2".to_string(),
        ];
        let pool = RelayPool::new(&urls, SupervisorConfig::default());
        let statuses = pool.statuses().await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| !s.connected));
        assert_eq!(statuses[0].url, urls[0]);
    }
}

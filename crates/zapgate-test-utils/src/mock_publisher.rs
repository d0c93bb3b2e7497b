// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publisher mock that records events instead of touching relays.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use zapgate_core::{EventPublisher, GatewayError};
use zapgate_proto::{Event, EventKind};

/// An [`EventPublisher`] that captures everything published.
pub struct RecordingPublisher {
    published: Mutex<Vec<Event>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// When set, every publish fails with `PublishFailed`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All events published so far, in order.
    pub fn published(&self) -> Vec<Event> {
        self.published.lock().expect("publisher lock poisoned").clone()
    }

    /// Published events of one kind, in order.
    pub fn published_of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.published()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().expect("publisher lock poisoned").clear();
    }
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: Event) -> Result<(), GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::PublishFailed);
        }
        self.published
            .lock()
            .expect("publisher lock poisoned")
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zapgate_proto::EventDraft;

    fn event(kind: EventKind) -> Event {
        EventDraft::new("author", 1, kind, vec![], "x").into_event(String::new())
    }

    #[tokio::test]
    async fn records_published_events_by_kind() {
        let publisher = RecordingPublisher::new();
        publisher.publish(event(EventKind::Text)).await.unwrap();
        publisher.publish(event(EventKind::Balance)).await.unwrap();

        assert_eq!(publisher.published().len(), 2);
        assert_eq!(publisher.published_of_kind(EventKind::Balance).len(), 1);
    }

    #[tokio::test]
    async fn failing_mode_rejects() {
        let publisher = RecordingPublisher::new();
        publisher.set_failing(true);
        assert!(publisher.publish(event(EventKind::Text)).await.is_err());
        assert!(publisher.published().is_empty());

        publisher.set_failing(false);
        publisher.publish(event(EventKind::Text)).await.unwrap();
        assert_eq!(publisher.published().len(), 1);
    }
}

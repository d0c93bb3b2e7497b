// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-relay connection state and counters.

/// Observable state of one relay connection.
#[derive(Debug, Clone)]
pub struct RelayStatus {
    pub url: String,
    pub connected: bool,
    /// Unix millis of the last received event.
    pub last_seen_ms: Option<i64>,
    pub messages_in: u64,
    pub messages_out: u64,
    pub errors: u64,
    pub last_error: Option<String>,
    pub reconnect_attempts: u32,
    /// Set when the reconnect budget is exhausted; the relay is removed
    /// from rotation until restart.
    pub permanently_failed: bool,
}

impl RelayStatus {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connected: false,
            last_seen_ms: None,
            messages_in: 0,
            messages_out: 0,
            errors: 0,
            last_error: None,
            reconnect_attempts: 0,
            permanently_failed: false,
        }
    }

    pub(crate) fn record_error(&mut self, error: impl Into<String>) {
        self.errors += 1;
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_status_starts_disconnected() {
        let status = RelayStatus::new("wss://relay.example.com");
        assert!(!status.connected);
        assert!(!status.permanently_failed);
        assert_eq!(status.messages_in, 0);
        assert_eq!(status.reconnect_attempts, 0);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn record_error_bumps_counter_and_keeps_last() {
        let mut status = RelayStatus::new("wss://relay.example.com");
        status.record_error("connect refused");
        status.record_error("stream reset");
        assert_eq!(status.errors, 2);
        assert_eq!(status.last_error.as_deref(), Some("stream reset"));
    }
}

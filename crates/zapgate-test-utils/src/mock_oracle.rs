// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI oracle with scripted responses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use zapgate_core::{ChatTurn, GatewayError, Oracle};

enum Scripted {
    Reply(String),
    Failure(String),
}

/// An [`Oracle`] that pops scripted outcomes from a FIFO queue.
///
/// When the queue is empty, a default `"mock response"` is returned.
/// Call counts and the histories passed in are recorded for assertions.
pub struct MockOracle {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    histories: Arc<Mutex<Vec<Vec<ChatTurn>>>>,
    calls: AtomicU32,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            histories: Arc::new(Mutex::new(Vec::new())),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_responses(responses: Vec<&str>) -> Self {
        let oracle = Self::new();
        {
            let mut script = oracle.script.try_lock().expect("fresh mutex");
            for response in responses {
                script.push_back(Scripted::Reply(response.to_string()));
            }
        }
        oracle
    }

    /// Appends a successful response to the script.
    pub async fn add_response(&self, text: impl Into<String>) {
        self.script
            .lock()
            .await
            .push_back(Scripted::Reply(text.into()));
    }

    /// Appends a failure to the script.
    pub async fn add_failure(&self, message: impl Into<String>) {
        self.script
            .lock()
            .await
            .push_back(Scripted::Failure(message.into()));
    }

    /// How many times `generate` was invoked.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// The history slices passed to each call, in order.
    pub async fn recorded_histories(&self) -> Vec<Vec<ChatTurn>> {
        self.histories.lock().await.clone()
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn generate(
        &self,
        _prompt: &str,
        history: &[ChatTurn],
    ) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.histories.lock().await.push(history.to_vec());

        match self.script.lock().await.pop_front() {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Failure(message)) => Err(GatewayError::Oracle {
                message,
                source: None,
            }),
            None => Ok("mock response".to_string()),
        }
    }
}

// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Messages-style completion API.
//!
//! Handles request construction, authentication headers, and a single
//! retry on transient errors (429, 500, 503, 529).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use zapgate_core::{ChatTurn, GatewayError, Oracle, TurnRole};

use crate::types::{ApiErrorResponse, ApiMessage, MessageRequest, MessageResponse};

const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_RESPONSE_TOKENS: u32 = 1024;

/// HTTP client for the AI backend.
#[derive(Debug, Clone)]
pub struct OracleClient {
    client: reqwest::Client,
    model: String,
    system_prompt: Option<String>,
    max_retries: u32,
    base_url: String,
}

impl OracleClient {
    /// Creates a client with the given API key, model, and hard timeout.
    pub fn new(api_key: &str, model: String, timeout: Duration) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| GatewayError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Oracle {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model,
            system_prompt: None,
            max_retries: 1,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Sets the system prompt sent with every request.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_request(&self, prompt: &str, history: &[ChatTurn]) -> MessageRequest {
        let mut messages: Vec<ApiMessage> = history
            .iter()
            .map(|turn| ApiMessage {
                role: match turn.role {
                    TurnRole::User => "user".into(),
                    TurnRole::Assistant => "assistant".into(),
                },
                content: turn.text.clone(),
            })
            .collect();
        messages.push(ApiMessage {
            role: "user".into(),
            content: prompt.to_string(),
        });

        MessageRequest {
            model: self.model.clone(),
            max_tokens: MAX_RESPONSE_TOKENS,
            system: self.system_prompt.clone(),
            messages,
        }
    }

    async fn complete(&self, request: &MessageRequest) -> Result<MessageResponse, GatewayError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&self.base_url)
                .json(request)
                .send()
                .await
                .map_err(|e| GatewayError::Oracle {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "completion response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| GatewayError::Oracle {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return serde_json::from_str(&body).map_err(|e| GatewayError::Oracle {
                    message: format!("failed to parse API response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(GatewayError::Oracle {
                    message: format!("API returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "API error ({}): {}",
                    api_err.error.error_type, api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(GatewayError::Oracle {
                message,
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| GatewayError::Oracle {
            message: "completion request failed after retries".into(),
            source: None,
        }))
    }
}

#[async_trait]
impl Oracle for OracleClient {
    async fn generate(
        &self,
        prompt: &str,
        history: &[ChatTurn],
    ) -> Result<String, GatewayError> {
        let request = self.build_request(prompt, history);
        let response = self.complete(&request).await?;
        Ok(response.text())
    }
}

/// True for HTTP status codes worth a single retry.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

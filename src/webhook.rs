//! Target-bot webhook forwarding
//!
//! The start call is relayed to a caller-supplied webhook with bearer auth.
//! Its response is passed back largely unexamined.

mod error;

pub use error::WebhookError;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where to send the start payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: String,
    pub bearer_token: String,
}

/// Successful webhook response
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookReply {
    pub status: u16,
    /// Parsed JSON body, or the raw text as a JSON string when it is not JSON
    pub body: Value,
}

/// Sends payloads to a target-bot webhook
#[async_trait]
pub trait WebhookForwarder: Send + Sync {
    async fn forward(
        &self,
        target: &WebhookTarget,
        payload: &Value,
    ) -> Result<WebhookReply, WebhookError>;
}

/// reqwest-backed forwarder
pub struct HttpWebhook {
    client: Client,
}

impl HttpWebhook {
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WebhookError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookForwarder for HttpWebhook {
    async fn forward(
        &self,
        target: &WebhookTarget,
        payload: &Value,
    ) -> Result<WebhookReply, WebhookError> {
        let response = self
            .client
            .post(&target.url)
            .bearer_auth(&target.bearer_token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WebhookError::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(WebhookError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(WebhookReply {
            status: status.as_u16(),
            body: parse_body(body),
        })
    }
}

fn parse_body(body: String) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

/// Logging wrapper for webhook forwarders
pub struct LoggingForwarder {
    inner: Arc<dyn WebhookForwarder>,
}

impl LoggingForwarder {
    pub fn new(inner: Arc<dyn WebhookForwarder>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl WebhookForwarder for LoggingForwarder {
    async fn forward(
        &self,
        target: &WebhookTarget,
        payload: &Value,
    ) -> Result<WebhookReply, WebhookError> {
        let start = Instant::now();
        let result = self.inner.forward(target, payload).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    url = %target.url,
                    status = reply.status,
                    duration_ms = %duration.as_millis(),
                    "Webhook call completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    url = %target.url,
                    status = ?e.upstream_status(),
                    duration_ms = %duration.as_millis(),
                    error = %e,
                    "Webhook call failed"
                );
            }
        }

        result
    }
}

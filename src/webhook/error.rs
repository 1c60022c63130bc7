//! Webhook error types

use thiserror::Error;

/// Failure talking to the target-bot webhook
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The webhook answered with a non-success status
    #[error("Webhook returned {status}: {body}")]
    Upstream { status: u16, body: String },
    /// The request never produced a response (DNS, connect, timeout, ...)
    #[error("Failed to reach webhook: {0}")]
    Transport(String),
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),
}

impl WebhookError {
    /// Upstream status code when the webhook responded at all
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            WebhookError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WebhookError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            WebhookError::InvalidUrl(e.to_string())
        } else {
            WebhookError::Transport(e.to_string())
        }
    }
}

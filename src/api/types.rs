//! API request and response types

use crate::store::{Message, QuickReply, StoreStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query for GET/DELETE `conversation-updates`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    pub conversation_id: Option<String>,
    pub check_analysis: Option<String>,
}

impl ConversationQuery {
    /// Only the literal `true` enables the analysis check
    pub fn wants_analysis(&self) -> bool {
        self.check_analysis.as_deref() == Some("true")
    }
}

/// Request to append a message to a conversation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub conversation_id: Option<String>,
    pub actor: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub quick_replies: Option<Vec<QuickReply>>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Response after appending a message
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageResponse {
    pub success: bool,
    pub message: String,
    pub conversation: Vec<Message>,
    pub expires_at: DateTime<Utc>,
}

/// Response for clearing a conversation
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

/// Store-wide statistics
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatsResponse {
    pub total_conversations: usize,
    pub oldest_conversation: Option<DateTime<Utc>>,
    pub expiration_time_hours: f64,
    pub cleaned_in_last_run: usize,
}

impl From<StoreStats> for StoreStatsResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            total_conversations: stats.total_conversations,
            oldest_conversation: stats.oldest_conversation,
            expiration_time_hours: stats.expiration_time_hours,
            cleaned_in_last_run: stats.cleaned_in_last_run,
        }
    }
}

/// Body of the start call, as sent by the driver and validated by the server.
///
/// The server forwards the raw body, so fields not listed here survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub session_data: SessionData,
}

/// Session configuration carried by the start call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub target_bot: TargetBot,
    #[serde(default)]
    pub human_description: String,
    #[serde(default)]
    pub bot_description: String,
    #[serde(default)]
    pub user_tones: Vec<String>,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub intents: Vec<String>,
}

/// Credentials of the bot under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBot {
    #[serde(default)]
    pub webhook_url: String,
    #[serde(rename = "bearerToken", default)]
    pub bearer_token: String,
    #[serde(default)]
    pub bot_id: String,
}

/// Response after the webhook accepted the start call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisResponse {
    pub success: bool,
    pub webhook_response: Value,
}

/// Optional conversation id for `get-analysis-result`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResultRequest {
    pub conversation_id: Option<String>,
}

/// The (canned) analysis report
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResultResponse {
    pub success: bool,
    pub result: String,
    /// Whether the report was written into the store
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Request to seed a conversation with the demo script
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub success: bool,
    pub appended: usize,
    pub conversation: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            status: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

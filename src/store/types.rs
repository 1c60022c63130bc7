//! Conversation store record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Bot,
    User,
}

impl Actor {
    pub fn as_str(self) -> &'static str {
        match self {
            Actor::Bot => "bot",
            Actor::User => "user",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Actor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bot" => Ok(Actor::Bot),
            "user" => Ok(Actor::User),
            other => Err(format!("Unknown actor: {other}")),
        }
    }
}

/// Suggested reply chip attached to a bot message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickReply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_name: Option<String>,
}

impl QuickReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            icon_name: None,
        }
    }

    pub fn with_icon(text: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            icon_name: Some(icon.into()),
        }
    }
}

/// A single chat message as displayed to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub actor: Actor,
    pub text: String,
    #[serde(default)]
    pub quick_replies: Vec<QuickReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Message {
    pub fn new(actor: Actor, text: impl Into<String>) -> Self {
        Self {
            actor,
            text: text.into(),
            quick_replies: Vec::new(),
            image_url: None,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Actor::Bot, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Actor::User, text)
    }

    #[must_use]
    pub fn with_quick_replies(mut self, replies: Vec<QuickReply>) -> Self {
        self.quick_replies = replies;
        self
    }

    #[must_use]
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

/// State of one conversation held by the store
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRecord {
    pub id: String,
    pub messages: Vec<Message>,
    pub last_updated: DateTime<Utc>,
    pub analysis_result: Option<String>,
    pub analysis_completed: bool,
}

impl ConversationRecord {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            last_updated: now,
            analysis_result: None,
            analysis_completed: false,
        }
    }

    /// Zero-value record returned for ids the store does not hold
    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, DateTime::<Utc>::default())
    }

    /// Refresh `last_updated`, never moving it backwards
    pub(super) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    pub fn analysis_status(&self) -> AnalysisStatus {
        AnalysisStatus {
            analysis_completed: self.analysis_completed,
            analysis_result: self.analysis_result.clone().unwrap_or_default(),
        }
    }
}

/// Wire shape of the analysis-completion check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    pub analysis_completed: bool,
    #[serde(default)]
    pub analysis_result: String,
}

/// Store-wide statistics
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub total_conversations: usize,
    pub oldest_conversation: Option<DateTime<Utc>>,
    pub expiration_time_hours: f64,
    pub cleaned_in_last_run: usize,
}

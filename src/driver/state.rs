//! Session state types

use crate::api::{SessionData, StartAnalysisRequest, TargetBot};
use crate::store::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// At most this many user tones may be selected at once
pub const MAX_USER_TONES: usize = 4;

/// Lifecycle stage of an analysis session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    /// Configuring, nothing in flight
    #[default]
    Initial,

    /// Analysis running, timers armed
    Processing { consecutive_errors: u32 },

    /// Analysis report received
    Finished,

    /// Gave up; `message` is shown to the operator
    Error { message: String },
}

impl Stage {
    pub fn is_processing(&self) -> bool {
        matches!(self, Stage::Processing { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Finished | Stage::Error { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::Processing { .. } => "processing",
            Stage::Finished => "finished",
            Stage::Error { .. } => "error",
        }
    }
}

/// Simulated-user tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTone {
    Polite,
    Impatient,
    Stressed,
    Enthusiastic,
    Frustrated,
    Confused,
}

impl UserTone {
    pub const ALL: [UserTone; 6] = [
        UserTone::Polite,
        UserTone::Impatient,
        UserTone::Stressed,
        UserTone::Enthusiastic,
        UserTone::Frustrated,
        UserTone::Confused,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UserTone::Polite => "polite",
            UserTone::Impatient => "impatient",
            UserTone::Stressed => "stressed",
            UserTone::Enthusiastic => "enthusiastic",
            UserTone::Frustrated => "frustrated",
            UserTone::Confused => "confused",
        }
    }
}

impl fmt::Display for UserTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserTone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserTone::ALL
            .into_iter()
            .find(|tone| tone.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownTone(s.to_string()))
    }
}

/// Session configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("You can select at most {} user tones", MAX_USER_TONES)]
    TooManyTones,
    #[error("Unknown user tone: {0}")]
    UnknownTone(String),
}

/// Credentials of the bot under test
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub bot_id: String,
    pub bearer_token: String,
    pub webhook_url: String,
}

impl Credentials {
    /// Names of the fields that are empty or whitespace-only
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("bot id", &self.bot_id),
            ("bearer token", &self.bearer_token),
            ("webhook URL", &self.webhook_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Operator-entered session settings, carried through to the start call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub credentials: Credentials,
    pub human_description: String,
    pub bot_description: String,
    pub user_tones: Vec<UserTone>,
    pub goal: String,
    pub intents: Vec<String>,
}

impl SessionConfig {
    /// Select or deselect a tone. Returns whether the tone is now selected.
    pub fn toggle_tone(&mut self, tone: UserTone) -> Result<bool, ConfigError> {
        if let Some(pos) = self.user_tones.iter().position(|t| *t == tone) {
            self.user_tones.remove(pos);
            return Ok(false);
        }
        if self.user_tones.len() >= MAX_USER_TONES {
            return Err(ConfigError::TooManyTones);
        }
        self.user_tones.push(tone);
        Ok(true)
    }

    /// Select a tone; selecting one that is already selected is a no-op
    pub fn select_tone(&mut self, tone: UserTone) -> Result<(), ConfigError> {
        if self.user_tones.contains(&tone) {
            return Ok(());
        }
        self.toggle_tone(tone).map(|_| ())
    }

    pub fn to_start_request(&self, conversation_id: &str) -> StartAnalysisRequest {
        StartAnalysisRequest {
            conversation_id: Some(conversation_id.to_string()),
            session_data: SessionData {
                target_bot: TargetBot {
                    webhook_url: self.credentials.webhook_url.clone(),
                    bearer_token: self.credentials.bearer_token.clone(),
                    bot_id: self.credentials.bot_id.clone(),
                },
                human_description: self.human_description.clone(),
                bot_description: self.bot_description.clone(),
                user_tones: self
                    .user_tones
                    .iter()
                    .map(|t| t.as_str().to_string())
                    .collect(),
                goal: self.goal.clone(),
                intents: self.intents.clone(),
            },
        }
    }
}

/// Everything the driver knows about the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub conversation_id: String,
    pub stage: Stage,
    /// Local mirror of the server-side conversation
    pub conversation: Vec<Message>,
    pub analysis_result: String,
    pub config: SessionConfig,
}

impl SessionState {
    pub fn new(conversation_id: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            stage: Stage::Initial,
            conversation: Vec::new(),
            analysis_result: String::new(),
            config,
        }
    }
}

/// Severity of an operator notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Short message surfaced to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

//! Effects produced by session transitions

use super::event::Timer;
use super::state::{Notice, NoticeLevel};
use crate::api::StartAnalysisRequest;
use std::time::Duration;

/// Effects to be executed after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEffect {
    /// Wipe the server-side record
    ClearConversation { conversation_id: String },

    /// Issue the start call
    StartAnalysis { request: StartAnalysisRequest },

    FetchMessages { conversation_id: String },

    CheckAnalysis { conversation_id: String },

    /// Arm (or re-arm) a timer
    ArmTimer { timer: Timer, after: Duration },

    DisarmAllTimers,

    Notify(Notice),
}

impl DriverEffect {
    pub fn notify(level: NoticeLevel, text: impl Into<String>) -> Self {
        DriverEffect::Notify(Notice::new(level, text))
    }

    pub fn arm(timer: Timer, after: Duration) -> Self {
        DriverEffect::ArmTimer { timer, after }
    }
}

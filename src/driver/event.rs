//! Events that drive session transitions

use super::ApiError;
use crate::store::{AnalysisStatus, Message};

/// Driver timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Repeating message poll
    MessagePoll,
    /// Repeating analysis-completion check
    AnalysisCheck,
    /// One-shot; re-armed on every successful poll
    Inactivity,
}

impl Timer {
    pub const ALL: [Timer; 3] = [Timer::MessagePoll, Timer::AnalysisCheck, Timer::Inactivity];

    pub fn repeats(self) -> bool {
        !matches!(self, Timer::Inactivity)
    }
}

/// Events fed to [`super::transition`]
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// Operator asked to start the analysis
    Start,

    /// Operator asked for a fresh session
    Reset { conversation_id: String },

    TimerFired(Timer),

    // Responses. Each carries the conversation id it was issued for.
    Cleared {
        conversation_id: String,
        result: Result<(), ApiError>,
    },
    StartCompleted {
        conversation_id: String,
        result: Result<(), ApiError>,
    },
    MessagesFetched {
        conversation_id: String,
        result: Result<Vec<Message>, ApiError>,
    },
    AnalysisChecked {
        conversation_id: String,
        result: Result<AnalysisStatus, ApiError>,
    },
}

impl DriverEvent {
    /// Conversation a response event belongs to; `None` for non-responses
    pub fn response_for(&self) -> Option<&str> {
        match self {
            DriverEvent::Cleared {
                conversation_id, ..
            }
            | DriverEvent::StartCompleted {
                conversation_id, ..
            }
            | DriverEvent::MessagesFetched {
                conversation_id, ..
            }
            | DriverEvent::AnalysisChecked {
                conversation_id, ..
            } => Some(conversation_id),
            DriverEvent::Start | DriverEvent::Reset { .. } | DriverEvent::TimerFired(_) => None,
        }
    }
}

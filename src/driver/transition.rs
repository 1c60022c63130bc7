//! Pure session transition function
//!
//! Given the same state, policy and event, `transition` always produces the
//! same outputs. All I/O is expressed as [`DriverEffect`]s.

use super::{ApiError, DriverEffect, DriverEvent, NoticeLevel, SessionState, Stage, Timer};
use crate::config::PollPolicy;
use crate::store::AnalysisStatus;
use thiserror::Error;

/// Consecutive failed server calls tolerated before giving up
pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

pub const INACTIVITY_MESSAGE: &str =
    "No conversation updates received in time. The analysis was stopped.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<DriverEffect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: DriverEffect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = DriverEffect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Please fill in the {0} before starting")]
    MissingCredentials(String),
    #[error("An analysis is already running")]
    AlreadyRunning,
    #[error("Reset the session before starting a new analysis")]
    ResetRequired,
}

#[allow(clippy::too_many_lines)]
pub fn transition(
    state: &SessionState,
    policy: &PollPolicy,
    event: DriverEvent,
) -> Result<TransitionResult, TransitionError> {
    // Responses for another conversation, or arriving outside processing,
    // are dropped without touching state
    if let Some(id) = event.response_for() {
        if id != state.conversation_id || !state.stage.is_processing() {
            return Ok(TransitionResult::new(state.clone()));
        }
    }

    match (&state.stage, event) {
        // ============================================================
        // Operator commands
        // ============================================================
        (Stage::Initial, DriverEvent::Start) => {
            let missing = state.config.credentials.missing_fields();
            if !missing.is_empty() {
                return Err(TransitionError::MissingCredentials(missing.join(", ")));
            }

            let id = state.conversation_id.clone();
            let mut next = state.clone();
            next.stage = Stage::Processing {
                consecutive_errors: 0,
            };
            next.conversation.clear();
            next.analysis_result.clear();

            // The start call goes out once the clear has been answered
            Ok(TransitionResult::new(next)
                .with_effect(DriverEffect::ClearConversation {
                    conversation_id: id,
                })
                .with_effects(arm_all(policy))
                .with_effect(DriverEffect::notify(NoticeLevel::Info, "Analysis started")))
        }

        (Stage::Processing { .. }, DriverEvent::Start) => Err(TransitionError::AlreadyRunning),

        (Stage::Finished | Stage::Error { .. }, DriverEvent::Start) => {
            Err(TransitionError::ResetRequired)
        }

        (_, DriverEvent::Reset { conversation_id }) => {
            let next = SessionState::new(conversation_id, state.config.clone());
            Ok(TransitionResult::new(next)
                .with_effect(DriverEffect::DisarmAllTimers)
                .with_effect(DriverEffect::notify(
                    NoticeLevel::Info,
                    "Session reset",
                )))
        }

        // ============================================================
        // Timers
        // ============================================================
        (Stage::Processing { .. }, DriverEvent::TimerFired(Timer::MessagePoll)) => {
            Ok(TransitionResult::new(state.clone()).with_effect(DriverEffect::FetchMessages {
                conversation_id: state.conversation_id.clone(),
            }))
        }

        (Stage::Processing { .. }, DriverEvent::TimerFired(Timer::AnalysisCheck)) => {
            Ok(TransitionResult::new(state.clone()).with_effect(DriverEffect::CheckAnalysis {
                conversation_id: state.conversation_id.clone(),
            }))
        }

        (Stage::Processing { .. }, DriverEvent::TimerFired(Timer::Inactivity)) => {
            Ok(fail(state, INACTIVITY_MESSAGE.to_string()))
        }

        // Late tick after the timers were torn down
        (_, DriverEvent::TimerFired(_)) => Ok(TransitionResult::new(state.clone())),

        // ============================================================
        // Server responses (already known to be current)
        // ============================================================
        (Stage::Processing { .. }, DriverEvent::StartCompleted { result, .. }) => match result {
            Ok(()) => Ok(TransitionResult::new(state.clone()).with_effect(DriverEffect::notify(
                NoticeLevel::Success,
                "Target bot accepted the analysis request",
            ))),
            Err(e) => Ok(fail(state, format!("Failed to start analysis: {e}"))),
        },

        (Stage::Processing { .. }, DriverEvent::Cleared { result, .. }) => {
            let result = match result {
                Ok(()) => TransitionResult::new(state.clone()),
                Err(e) => record_failure(state, &e),
            };
            if !result.new_state.stage.is_processing() {
                return Ok(result);
            }
            let request = state.config.to_start_request(&state.conversation_id);
            Ok(result.with_effect(DriverEffect::StartAnalysis { request }))
        }

        (Stage::Processing { .. }, DriverEvent::MessagesFetched { result, .. }) => match result {
            Ok(messages) => {
                let mut next = on_success(state);
                next.conversation = messages;
                Ok(TransitionResult::new(next)
                    .with_effect(DriverEffect::arm(Timer::Inactivity, policy.inactivity_timeout)))
            }
            Err(e) => Ok(record_failure(state, &e)),
        },

        (Stage::Processing { .. }, DriverEvent::AnalysisChecked { result, .. }) => match result {
            Ok(AnalysisStatus {
                analysis_completed: true,
                analysis_result,
            }) => {
                let mut next = state.clone();
                next.stage = Stage::Finished;
                next.analysis_result = analysis_result;
                Ok(TransitionResult::new(next)
                    .with_effect(DriverEffect::DisarmAllTimers)
                    .with_effect(DriverEffect::notify(
                        NoticeLevel::Success,
                        "Analysis complete",
                    )))
            }
            Ok(_) => Ok(TransitionResult::new(on_success(state))
                .with_effect(DriverEffect::arm(Timer::Inactivity, policy.inactivity_timeout))),
            Err(e) => Ok(record_failure(state, &e)),
        },

        // Responses outside processing were filtered above
        (
            Stage::Initial | Stage::Finished | Stage::Error { .. },
            DriverEvent::StartCompleted { .. }
            | DriverEvent::Cleared { .. }
            | DriverEvent::MessagesFetched { .. }
            | DriverEvent::AnalysisChecked { .. },
        ) => Ok(TransitionResult::new(state.clone())),
    }
}

fn arm_all(policy: &PollPolicy) -> [DriverEffect; 3] {
    [
        DriverEffect::arm(Timer::MessagePoll, policy.message_interval),
        DriverEffect::arm(Timer::AnalysisCheck, policy.analysis_interval),
        DriverEffect::arm(Timer::Inactivity, policy.inactivity_timeout),
    ]
}

/// Copy of `state` with the error counter reset
fn on_success(state: &SessionState) -> SessionState {
    let mut next = state.clone();
    next.stage = Stage::Processing {
        consecutive_errors: 0,
    };
    next
}

fn record_failure(state: &SessionState, error: &ApiError) -> TransitionResult {
    let errors = match state.stage {
        Stage::Processing { consecutive_errors } => consecutive_errors + 1,
        _ => 1,
    };

    if errors >= MAX_CONSECUTIVE_ERRORS {
        return fail(
            state,
            format!("Too many communication errors ({errors} in a row). Last error: {error}"),
        );
    }

    let mut next = state.clone();
    next.stage = Stage::Processing {
        consecutive_errors: errors,
    };
    TransitionResult::new(next)
}

fn fail(state: &SessionState, message: String) -> TransitionResult {
    let mut next = state.clone();
    next.stage = Stage::Error {
        message: message.clone(),
    };
    TransitionResult::new(next)
        .with_effect(DriverEffect::DisarmAllTimers)
        .with_effect(DriverEffect::notify(NoticeLevel::Error, message))
}

//! Property-based tests for the session state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::transition::*;
use super::*;
use crate::config::PollPolicy;
use crate::store::{AnalysisStatus, Message};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_credentials() -> impl Strategy<Value = Credentials> {
    ("[a-z0-9 ]{0,6}", "[a-zA-Z0-9 ]{0,6}", "(https://[a-z]{1,8}\\.test/hook)?").prop_map(
        |(bot_id, bearer_token, webhook_url)| Credentials {
            bot_id,
            bearer_token,
            webhook_url,
        },
    )
}

fn arb_config() -> impl Strategy<Value = SessionConfig> {
    arb_credentials().prop_map(|credentials| SessionConfig {
        credentials,
        ..SessionConfig::default()
    })
}

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Initial),
        (0..MAX_CONSECUTIVE_ERRORS)
            .prop_map(|consecutive_errors| Stage::Processing { consecutive_errors }),
        Just(Stage::Finished),
        "[a-zA-Z ]{1,20}".prop_map(|message| Stage::Error { message }),
    ]
}

fn arb_state() -> impl Strategy<Value = SessionState> {
    (arb_stage(), arb_config()).prop_map(|(stage, config)| {
        let mut state = SessionState::new("conv-1", config);
        state.stage = stage;
        state
    })
}

fn arb_conversation_id() -> impl Strategy<Value = String> {
    prop_oneof![3 => Just("conv-1".to_string()), 1 => Just("conv-0".to_string())]
}

fn arb_api_error() -> impl Strategy<Value = ApiError> {
    prop_oneof![
        (400u16..600).prop_map(|status| ApiError::Status {
            status,
            body: String::new()
        }),
        Just(ApiError::Network("connection refused".to_string())),
        Just(ApiError::UnexpectedContentType("text/html".to_string())),
    ]
}

fn arb_timer() -> impl Strategy<Value = Timer> {
    prop_oneof![
        Just(Timer::MessagePoll),
        Just(Timer::AnalysisCheck),
        Just(Timer::Inactivity),
    ]
}

fn arb_event() -> impl Strategy<Value = DriverEvent> {
    prop_oneof![
        Just(DriverEvent::Start),
        "[a-z]{6}".prop_map(|conversation_id| DriverEvent::Reset { conversation_id }),
        arb_timer().prop_map(DriverEvent::TimerFired),
        (arb_conversation_id(), proptest::option::of(arb_api_error())).prop_map(|(id, err)| {
            DriverEvent::Cleared {
                conversation_id: id,
                result: err.map_or(Ok(()), Err),
            }
        }),
        (arb_conversation_id(), proptest::option::of(arb_api_error())).prop_map(|(id, err)| {
            DriverEvent::StartCompleted {
                conversation_id: id,
                result: err.map_or(Ok(()), Err),
            }
        }),
        (arb_conversation_id(), proptest::option::of(arb_api_error()), 0usize..4).prop_map(
            |(id, err, n)| DriverEvent::MessagesFetched {
                conversation_id: id,
                result: err.map_or_else(|| Ok(vec![Message::bot("hi"); n]), Err),
            }
        ),
        (
            arb_conversation_id(),
            proptest::option::of(arb_api_error()),
            any::<bool>()
        )
            .prop_map(|(id, err, completed)| DriverEvent::AnalysisChecked {
                conversation_id: id,
                result: err.map_or_else(
                    || Ok(AnalysisStatus {
                        analysis_completed: completed,
                        analysis_result: "report".to_string(),
                    }),
                    Err
                ),
            }),
    ]
}

fn has_effect(result: &TransitionResult, pred: impl Fn(&DriverEffect) -> bool) -> bool {
    result.effects.iter().any(pred)
}

fn makes_call(effect: &DriverEffect) -> bool {
    matches!(
        effect,
        DriverEffect::ClearConversation { .. }
            | DriverEffect::StartAnalysis { .. }
            | DriverEffect::FetchMessages { .. }
            | DriverEffect::CheckAnalysis { .. }
    )
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Leaving processing always tears down every timer
    #[test]
    fn prop_leaving_processing_disarms_timers(state in arb_state(), event in arb_event()) {
        let was_processing = state.stage.is_processing();
        if let Ok(result) = transition(&state, &PollPolicy::default(), event) {
            if was_processing && !result.new_state.stage.is_processing() {
                prop_assert!(has_effect(&result, |e| *e == DriverEffect::DisarmAllTimers));
            }
        }
    }

    /// The error counter never reaches the threshold while still processing
    #[test]
    fn prop_error_counter_bounded(state in arb_state(), event in arb_event()) {
        if let Ok(result) = transition(&state, &PollPolicy::default(), event) {
            if let Stage::Processing { consecutive_errors } = result.new_state.stage {
                prop_assert!(consecutive_errors < MAX_CONSECUTIVE_ERRORS);
            }
        }
    }

    /// Outside processing nothing talks to the server, except a valid start
    #[test]
    fn prop_idle_stages_make_no_calls(state in arb_state(), event in arb_event()) {
        prop_assume!(!state.stage.is_processing());
        let is_start = matches!(event, DriverEvent::Start);
        if let Ok(result) = transition(&state, &PollPolicy::default(), event) {
            if has_effect(&result, makes_call) {
                prop_assert!(is_start);
                prop_assert_eq!(&state.stage, &Stage::Initial);
                prop_assert!(state.config.credentials.missing_fields().is_empty());
            }
        }
    }

    /// Start with any blank credential is rejected and leaves no trace
    #[test]
    fn prop_start_requires_all_credentials(config in arb_config()) {
        let state = SessionState::new("conv-1", config);
        let missing = state.config.credentials.missing_fields();
        let result = transition(&state, &PollPolicy::default(), DriverEvent::Start);
        if missing.is_empty() {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(
                matches!(result, Err(TransitionError::MissingCredentials(_))),
                "expected missing credentials error"
            );
        }
    }

    /// Responses for a different conversation never change anything
    #[test]
    fn prop_stale_responses_ignored(state in arb_state(), event in arb_event()) {
        prop_assume!(event.response_for() == Some("conv-0"));
        let result = transition(&state, &PollPolicy::default(), event).unwrap();
        prop_assert_eq!(result.new_state, state);
        prop_assert!(result.effects.is_empty());
    }

    /// Reset is accepted from every stage and always yields a clean session
    #[test]
    fn prop_reset_from_anywhere(state in arb_state(), id in "[a-z]{6}") {
        let result = transition(
            &state,
            &PollPolicy::default(),
            DriverEvent::Reset { conversation_id: id.clone() },
        )
        .unwrap();
        prop_assert_eq!(&result.new_state.conversation_id, &id);
        prop_assert_eq!(&result.new_state.stage, &Stage::Initial);
        prop_assert!(result.new_state.conversation.is_empty());
        prop_assert_eq!(&result.new_state.config, &state.config);
        prop_assert!(has_effect(&result, |e| *e == DriverEffect::DisarmAllTimers));
    }
}

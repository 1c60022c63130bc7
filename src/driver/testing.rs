//! Mock implementations for testing
//!
//! These mocks enable driving whole sessions without real I/O or real time.

use super::traits::{ConversationApi, Scheduler, TimerTick};
use super::{ApiError, Timer};
use crate::api::StartAnalysisRequest;
use crate::store::{AnalysisStatus, Message};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Conversation API
// ============================================================================

/// A recorded server call
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Clear(String),
    Start(StartAnalysisRequest),
    FetchMessages(String),
    CheckAnalysis(String),
}

/// Mock server with queued responses. Empty queues answer successfully:
/// no messages, analysis not completed.
#[derive(Default)]
pub struct MockConversationApi {
    clear_results: Mutex<VecDeque<Result<(), ApiError>>>,
    start_results: Mutex<VecDeque<Result<Value, ApiError>>>,
    message_results: Mutex<VecDeque<Result<Vec<Message>, ApiError>>>,
    analysis_results: Mutex<VecDeque<Result<AnalysisStatus, ApiError>>>,
    start_delay: Mutex<Option<Duration>>,
    /// Record of all calls made
    pub calls: Mutex<Vec<ApiCall>>,
}

impl MockConversationApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_clear(&self, result: Result<(), ApiError>) {
        self.clear_results.lock().unwrap().push_back(result);
    }

    pub fn queue_start(&self, result: Result<Value, ApiError>) {
        self.start_results.lock().unwrap().push_back(result);
    }

    pub fn queue_messages(&self, result: Result<Vec<Message>, ApiError>) {
        self.message_results.lock().unwrap().push_back(result);
    }

    pub fn queue_analysis(&self, result: Result<AnalysisStatus, ApiError>) {
        self.analysis_results.lock().unwrap().push_back(result);
    }

    /// Make every start call take `delay` before answering
    pub fn set_start_delay(&self, delay: Duration) {
        *self.start_delay.lock().unwrap() = Some(delay);
    }

    pub fn recorded_calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ConversationApi for MockConversationApi {
    async fn clear(&self, conversation_id: &str) -> Result<(), ApiError> {
        self.record(ApiCall::Clear(conversation_id.to_string()));
        self.clear_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn start(&self, request: &StartAnalysisRequest) -> Result<Value, ApiError> {
        self.record(ApiCall::Start(request.clone()));
        let delay = *self.start_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.start_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "success": true })))
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        self.record(ApiCall::FetchMessages(conversation_id.to_string()));
        self.message_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn check_analysis(&self, conversation_id: &str) -> Result<AnalysisStatus, ApiError> {
        self.record(ApiCall::CheckAnalysis(conversation_id.to_string()));
        self.analysis_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(AnalysisStatus {
                    analysis_completed: false,
                    analysis_result: String::new(),
                })
            })
    }
}

// ============================================================================
// Manual Scheduler
// ============================================================================

/// Scheduler that only records arming; tests fire timers by hand
#[derive(Default)]
pub struct ManualScheduler {
    armed: Mutex<HashMap<Timer, (u64, Duration)>>,
    next_generation: Mutex<u64>,
    /// Every arming, in order
    pub history: Mutex<Vec<(Timer, Duration)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed_timers(&self) -> Vec<Timer> {
        Timer::ALL
            .into_iter()
            .filter(|t| self.armed.lock().unwrap().contains_key(t))
            .collect()
    }

    pub fn interval(&self, timer: Timer) -> Option<Duration> {
        self.armed.lock().unwrap().get(&timer).map(|(_, after)| *after)
    }
}

impl Scheduler for ManualScheduler {
    fn arm(&self, timer: Timer, after: Duration) {
        let mut next = self.next_generation.lock().unwrap();
        *next += 1;
        self.armed.lock().unwrap().insert(timer, (*next, after));
        self.history.lock().unwrap().push((timer, after));
    }

    fn disarm(&self, timer: Timer) {
        self.armed.lock().unwrap().remove(&timer);
    }

    fn disarm_all(&self) {
        self.armed.lock().unwrap().clear();
    }

    fn armed(&self, timer: Timer) -> Option<TimerTick> {
        self.armed
            .lock()
            .unwrap()
            .get(&timer)
            .map(|(generation, _)| TimerTick {
                timer,
                generation: *generation,
            })
    }
}

// ============================================================================
// Driver integration tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollPolicy;
    use crate::driver::{
        Credentials, NoticeLevel, SessionConfig, SessionDriver, Stage, TransitionError, UserTone,
        INACTIVITY_MESSAGE, MAX_CONSECUTIVE_ERRORS, MAX_USER_TONES,
    };
    use std::sync::Arc;

    type TestDriver = SessionDriver<Arc<MockConversationApi>, Arc<ManualScheduler>>;

    fn config() -> SessionConfig {
        SessionConfig {
            credentials: Credentials {
                bot_id: "bot-1".to_string(),
                bearer_token: "tok".to_string(),
                webhook_url: "https://bot.example/hook".to_string(),
            },
            goal: "Book a checkup".to_string(),
            ..SessionConfig::default()
        }
    }

    fn setup(config: SessionConfig) -> (TestDriver, Arc<MockConversationApi>, Arc<ManualScheduler>) {
        let api = Arc::new(MockConversationApi::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let driver = SessionDriver::new(
            api.clone(),
            scheduler.clone(),
            PollPolicy::default(),
            config,
        );
        (driver, api, scheduler)
    }

    fn server_error() -> ApiError {
        ApiError::Status {
            status: 500,
            body: "Internal Server Error".to_string(),
        }
    }

    #[tokio::test]
    async fn test_start_with_blank_credential_makes_no_call() {
        for blank in 0..3 {
            let mut config = config();
            match blank {
                0 => config.credentials.bot_id = String::new(),
                1 => config.credentials.bearer_token = "  ".to_string(),
                _ => config.credentials.webhook_url = String::new(),
            }
            let (mut driver, api, scheduler) = setup(config);

            let err = driver.start().unwrap_err();
            assert!(matches!(err, TransitionError::MissingCredentials(_)));
            assert_eq!(driver.state().stage, Stage::Initial);
            assert_eq!(api.call_count(), 0);
            assert!(scheduler.armed_timers().is_empty());
            assert_eq!(driver.notices().last().unwrap().level, NoticeLevel::Error);
        }
    }

    #[tokio::test]
    async fn test_start_clears_then_starts_and_arms_timers() {
        let (mut driver, api, scheduler) = setup(config());
        driver.start().unwrap();
        driver.settle().await;

        let id = driver.state().conversation_id.clone();
        let calls = api.recorded_calls();
        assert_eq!(calls[0], ApiCall::Clear(id.clone()));
        match &calls[1] {
            ApiCall::Start(request) => {
                assert_eq!(request.conversation_id.as_deref(), Some(id.as_str()));
                assert_eq!(request.session_data.goal, "Book a checkup");
            }
            other => panic!("Expected start call, got {other:?}"),
        }

        let policy = PollPolicy::default();
        assert!(driver.state().stage.is_processing());
        assert_eq!(scheduler.armed_timers(), Timer::ALL.to_vec());
        assert_eq!(
            scheduler.interval(Timer::MessagePoll),
            Some(policy.message_interval)
        );
        assert_eq!(
            scheduler.interval(Timer::AnalysisCheck),
            Some(policy.analysis_interval)
        );
    }

    #[tokio::test]
    async fn test_polls_mirror_server_conversation() {
        let (mut driver, api, _scheduler) = setup(config());
        driver.start().unwrap();
        driver.settle().await;

        let messages = vec![Message::bot("Welcome!"), Message::user("Hi")];
        api.queue_messages(Ok(messages.clone()));
        driver.fire(Timer::MessagePoll);
        driver.settle().await;

        assert_eq!(driver.state().conversation, messages);
    }

    #[tokio::test]
    async fn test_five_consecutive_failures_error_out() {
        let (mut driver, api, scheduler) = setup(config());
        driver.start().unwrap();
        driver.settle().await;

        for _ in 0..MAX_CONSECUTIVE_ERRORS {
            api.queue_messages(Err(server_error()));
        }
        for _ in 0..MAX_CONSECUTIVE_ERRORS - 1 {
            driver.fire(Timer::MessagePoll);
            driver.settle().await;
            assert!(driver.state().stage.is_processing());
        }
        driver.fire(Timer::MessagePoll);
        driver.settle().await;

        match &driver.state().stage {
            Stage::Error { message } => assert!(message.contains("Too many communication errors")),
            other => panic!("Expected error stage, got {other:?}"),
        }
        assert!(scheduler.armed_timers().is_empty());
    }

    #[tokio::test]
    async fn test_success_between_failures_resets_count() {
        let (mut driver, api, _scheduler) = setup(config());
        driver.start().unwrap();
        driver.settle().await;

        for _ in 0..MAX_CONSECUTIVE_ERRORS - 1 {
            api.queue_messages(Err(server_error()));
        }
        api.queue_messages(Ok(vec![]));
        for _ in 0..MAX_CONSECUTIVE_ERRORS - 1 {
            api.queue_messages(Err(server_error()));
        }

        for _ in 0..(2 * MAX_CONSECUTIVE_ERRORS - 1) {
            driver.fire(Timer::MessagePoll);
            driver.settle().await;
        }
        assert_eq!(
            driver.state().stage,
            Stage::Processing {
                consecutive_errors: MAX_CONSECUTIVE_ERRORS - 1
            }
        );
    }

    #[tokio::test]
    async fn test_completed_analysis_finishes_and_stops_polling() {
        let (mut driver, api, scheduler) = setup(config());
        driver.start().unwrap();
        driver.settle().await;

        api.queue_analysis(Ok(AnalysisStatus {
            analysis_completed: true,
            analysis_result: "X".to_string(),
        }));
        driver.fire(Timer::AnalysisCheck);
        driver.settle().await;

        assert_eq!(driver.state().stage, Stage::Finished);
        assert_eq!(driver.state().analysis_result, "X");
        assert!(scheduler.armed_timers().is_empty());

        let calls_before = api.call_count();
        for timer in Timer::ALL {
            driver.fire(timer);
            driver.settle().await;
        }
        assert_eq!(api.call_count(), calls_before);
    }

    #[tokio::test]
    async fn test_inactivity_timeout_errors_out() {
        let (mut driver, api, scheduler) = setup(config());
        driver.start().unwrap();
        driver.settle().await;
        let calls_before = api.call_count();

        driver.fire(Timer::Inactivity);

        driver.settle().await;

        assert_eq!(
            driver.state().stage,
            Stage::Error {
                message: INACTIVITY_MESSAGE.to_string()
            }
        );
        assert!(scheduler.armed_timers().is_empty());
        assert_eq!(api.call_count(), calls_before);
    }

    #[tokio::test]
    async fn test_successful_poll_rearms_inactivity() {
        let (mut driver, _api, scheduler) = setup(config());
        driver.start().unwrap();
        driver.settle().await;
        let armings = |s: &ManualScheduler| {
            s.history
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, _)| *t == Timer::Inactivity)
                .count()
        };
        assert_eq!(armings(&scheduler), 1);

        driver.fire(Timer::MessagePoll);

        driver.settle().await;
        driver.fire(Timer::AnalysisCheck);
        driver.settle().await;
        assert_eq!(armings(&scheduler), 3);
    }

    #[tokio::test]
    async fn test_failed_start_call_errors_out() {
        let (mut driver, api, scheduler) = setup(config());
        api.queue_start(Err(ApiError::Status {
            status: 401,
            body: "unauthorized".to_string(),
        }));

        driver.start().unwrap();

        driver.settle().await;

        assert!(matches!(driver.state().stage, Stage::Error { .. }));
        assert!(scheduler.armed_timers().is_empty());
    }

    #[tokio::test]
    async fn test_failed_clear_counts_as_one_failure() {
        let (mut driver, api, _scheduler) = setup(config());
        api.queue_clear(Err(server_error()));

        driver.start().unwrap();

        driver.settle().await;

        assert_eq!(
            driver.state().stage,
            Stage::Processing {
                consecutive_errors: 1
            }
        );
    }

    #[tokio::test]
    async fn test_reset_starts_fresh_session() {
        let (mut driver, api, scheduler) = setup(config());
        driver.start().unwrap();
        driver.settle().await;
        api.queue_messages(Ok(vec![Message::bot("Hi")]));
        driver.fire(Timer::MessagePoll);
        driver.settle().await;
        let old_id = driver.state().conversation_id.clone();

        driver.reset();

        assert_ne!(driver.state().conversation_id, old_id);
        assert_eq!(driver.state().stage, Stage::Initial);
        assert!(driver.state().conversation.is_empty());
        assert!(driver.state().analysis_result.is_empty());
        assert_eq!(driver.state().config, config());
        assert!(scheduler.armed_timers().is_empty());

        // And the fresh session can be started again
        driver.start().unwrap();
        driver.settle().await;
        assert!(driver.state().stage.is_processing());
    }

    #[tokio::test]
    async fn test_reset_cancels_in_flight_calls() {
        let (mut driver, api, scheduler) = setup(config());
        driver.start().unwrap();
        assert_eq!(driver.in_flight(), 1);

        driver.reset();
        driver.settle().await;

        assert_eq!(driver.state().stage, Stage::Initial);
        assert_eq!(driver.in_flight(), 0);
        // The clear never went out, so no start call followed it
        assert_eq!(api.call_count(), 0);
        assert!(scheduler.armed_timers().is_empty());
    }

    #[tokio::test]
    async fn test_start_again_after_finish_requires_reset() {
        let (mut driver, api, _scheduler) = setup(config());
        driver.start().unwrap();
        driver.settle().await;
        api.queue_analysis(Ok(AnalysisStatus {
            analysis_completed: true,
            analysis_result: "done".to_string(),
        }));
        driver.fire(Timer::AnalysisCheck);
        driver.settle().await;

        let err = driver.start().unwrap_err();
        assert_eq!(err, TransitionError::ResetRequired);
        assert_eq!(driver.state().analysis_result, "done");
    }

    #[tokio::test]
    async fn test_config_locked_while_processing() {
        let (mut driver, _api, _scheduler) = setup(config());
        driver
            .update_config(|c| c.goal = "Return a bike".to_string())
            .unwrap();
        driver.start().unwrap();
        driver.settle().await;

        let err = driver
            .update_config(|c| c.goal = "Something else".to_string())
            .unwrap_err();
        assert_eq!(err, TransitionError::AlreadyRunning);
        assert_eq!(driver.state().config.goal, "Return a bike");
    }

    #[tokio::test]
    async fn test_tone_limit_raises_warning() {
        let (mut driver, _api, _scheduler) = setup(config());
        for tone in &UserTone::ALL[..MAX_USER_TONES] {
            driver.toggle_tone(*tone).unwrap();
        }
        assert!(driver.toggle_tone(UserTone::Confused).is_err());
        assert_eq!(driver.state().config.user_tones.len(), MAX_USER_TONES);
        assert_eq!(driver.notices().last().unwrap().level, NoticeLevel::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_with_tokio_scheduler() {
        use crate::driver::{DriverCommand, TokioScheduler};
        use tokio::sync::{mpsc, watch};

        let api = Arc::new(MockConversationApi::new());
        // Message polls at 2s and 4s land before the 5s analysis check
        for _ in 0..3 {
            api.queue_messages(Ok(vec![Message::bot("Hello")]));
        }
        api.queue_analysis(Ok(AnalysisStatus {
            analysis_completed: true,
            analysis_result: "Report".to_string(),
        }));

        let (scheduler, ticks) = TokioScheduler::new();
        let driver = SessionDriver::new(api.clone(), scheduler, PollPolicy::default(), config());
        let (command_tx, command_rx) = mpsc::channel(4);
        let (snapshot_tx, mut snapshot_rx) = watch::channel(driver.state().clone());
        let handle = tokio::spawn(driver.run(command_rx, ticks, snapshot_tx));

        command_tx.send(DriverCommand::Start).await.unwrap();
        let finished = snapshot_rx
            .wait_for(|state| state.stage == Stage::Finished)
            .await
            .unwrap()
            .clone();
        assert_eq!(finished.analysis_result, "Report");
        assert_eq!(finished.conversation, vec![Message::bot("Hello")]);

        command_tx.send(DriverCommand::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_not_blocked_by_slow_start_call() {
        use crate::driver::{DriverCommand, TokioScheduler};
        use tokio::sync::{mpsc, watch};
        use tokio::time::Instant;

        let api = Arc::new(MockConversationApi::new());
        api.set_start_delay(Duration::from_secs(30));

        let (scheduler, ticks) = TokioScheduler::new();
        let driver = SessionDriver::new(api.clone(), scheduler, PollPolicy::default(), config());
        let first_id = driver.state().conversation_id.clone();
        let (command_tx, command_rx) = mpsc::channel(4);
        let (snapshot_tx, mut snapshot_rx) = watch::channel(driver.state().clone());
        let handle = tokio::spawn(driver.run(command_rx, ticks, snapshot_tx));

        command_tx.send(DriverCommand::Start).await.unwrap();
        while !api
            .recorded_calls()
            .iter()
            .any(|call| matches!(call, ApiCall::Start(_)))
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let reset_at = Instant::now();
        command_tx.send(DriverCommand::Reset).await.unwrap();
        let fresh = snapshot_rx
            .wait_for(|state| state.stage == Stage::Initial && state.conversation_id != first_id)
            .await
            .unwrap()
            .clone();
        assert!(reset_at.elapsed() < Duration::from_secs(1));

        // The abandoned start call never lands on the fresh session
        tokio::time::sleep(Duration::from_secs(60)).await;
        let later = snapshot_rx.borrow().clone();
        assert_eq!(later.stage, Stage::Initial);
        assert_eq!(later.conversation_id, fresh.conversation_id);

        command_tx.send(DriverCommand::Shutdown).await.unwrap();
        handle.await.unwrap();
    }
}

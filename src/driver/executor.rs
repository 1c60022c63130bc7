//! Session executor
//!
//! Feeds events through [`transition`] and applies the resulting effects.
//! Server calls run as background tasks raced against the session's
//! cancellation token; their results come back in as further events, so an
//! operator command is never stuck behind a slow request.

use super::traits::{ConversationApi, Scheduler, TimerTick};
use super::transition::{transition, TransitionError};
use super::{
    ApiError, ConfigError, DriverEffect, DriverEvent, Notice, NoticeLevel, SessionConfig,
    SessionState, Timer, UserTone,
};
use crate::config::PollPolicy;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Operator commands for a running driver
#[derive(Debug, Clone)]
pub enum DriverCommand {
    Start,
    Reset,
    Shutdown,
}

pub struct SessionDriver<A, S> {
    state: SessionState,
    policy: PollPolicy,
    api: Arc<A>,
    scheduler: S,
    /// In-flight server calls; `None` means the call was cancelled
    calls: JoinSet<Option<DriverEvent>>,
    /// Cancels every in-flight call of the current session
    cancel: CancellationToken,
    notices: Vec<Notice>,
}

impl<A, S> SessionDriver<A, S>
where
    A: ConversationApi + 'static,
    S: Scheduler,
{
    pub fn new(api: A, scheduler: S, policy: PollPolicy, config: SessionConfig) -> Self {
        Self {
            state: SessionState::new(new_conversation_id(), config),
            policy,
            api: Arc::new(api),
            scheduler,
            calls: JoinSet::new(),
            cancel: CancellationToken::new(),
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Number of server calls still running
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }

    /// Select or deselect a user tone; a rejected toggle is surfaced as a notice
    pub fn toggle_tone(&mut self, tone: UserTone) -> Result<bool, ConfigError> {
        let result = self.state.config.toggle_tone(tone);
        if let Err(e) = &result {
            self.notify(Notice::new(NoticeLevel::Warning, e.to_string()));
        }
        result
    }

    /// Edit the session settings. Only allowed while nothing is running.
    pub fn update_config(
        &mut self,
        edit: impl FnOnce(&mut SessionConfig),
    ) -> Result<(), TransitionError> {
        if self.state.stage.is_processing() {
            return Err(TransitionError::AlreadyRunning);
        }
        edit(&mut self.state.config);
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.process_event(DriverEvent::Start)
    }

    /// Drop the current session and begin a fresh one under a new id
    pub fn reset(&mut self) {
        let event = DriverEvent::Reset {
            conversation_id: new_conversation_id(),
        };
        if let Err(e) = self.process_event(event) {
            tracing::error!(error = %e, "Reset rejected");
        }
    }

    /// Fire `timer` now if it is armed; ignored otherwise
    pub fn fire(&mut self, timer: Timer) {
        if let Some(tick) = self.scheduler.armed(timer) {
            self.on_tick(tick);
        }
    }

    /// Handle a tick delivered by the scheduler
    pub fn on_tick(&mut self, tick: TimerTick) {
        if !self.scheduler.is_current(tick) {
            tracing::debug!(timer = ?tick.timer, "Dropping stale timer tick");
            return;
        }
        if !tick.timer.repeats() {
            self.scheduler.disarm(tick.timer);
        }
        if let Err(e) = self.process_event(DriverEvent::TimerFired(tick.timer)) {
            tracing::error!(error = %e, "Timer event rejected");
        }
    }

    /// Wait for every in-flight call, including follow-ups they trigger,
    /// and apply the results
    pub async fn settle(&mut self) {
        while let Some(joined) = self.calls.join_next().await {
            self.on_call_finished(joined);
        }
    }

    /// Drive the session from operator commands, timer ticks and call
    /// results until shut down. Every handled input publishes a snapshot.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<DriverCommand>,
        mut ticks: mpsc::Receiver<TimerTick>,
        snapshots: watch::Sender<SessionState>,
    ) {
        tracing::info!(conversation_id = %self.state.conversation_id, "Session driver started");
        snapshots.send_replace(self.state.clone());

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(DriverCommand::Start) => {
                        // Rejections are already surfaced as notices
                        let _ = self.start();
                    }
                    Some(DriverCommand::Reset) => self.reset(),
                    Some(DriverCommand::Shutdown) | None => break,
                },
                Some(tick) = ticks.recv() => self.on_tick(tick),
                Some(joined) = self.calls.join_next(), if !self.calls.is_empty() => {
                    self.on_call_finished(joined);
                }
            }
            snapshots.send_replace(self.state.clone());
        }

        self.scheduler.disarm_all();
        self.cancel.cancel();
        self.calls.shutdown().await;
        tracing::info!(conversation_id = %self.state.conversation_id, "Session driver stopped");
    }

    fn on_call_finished(&mut self, joined: Result<Option<DriverEvent>, JoinError>) {
        match joined {
            Ok(Some(event)) => {
                if let Err(e) = self.process_event(event) {
                    tracing::error!(error = %e, "Call result rejected");
                }
            }
            Ok(None) => tracing::debug!("Server call cancelled"),
            Err(e) => tracing::error!(error = %e, "Server call task failed"),
        }
    }

    fn process_event(&mut self, event: DriverEvent) -> Result<(), TransitionError> {
        let result = match transition(&self.state, &self.policy, event) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, stage = self.state.stage.name(), "Event rejected");
                self.notify(Notice::new(NoticeLevel::Error, e.to_string()));
                return Err(e);
            }
        };

        if result.new_state.stage != self.state.stage {
            tracing::info!(
                conversation_id = %result.new_state.conversation_id,
                from = self.state.stage.name(),
                to = result.new_state.stage.name(),
                "Session stage changed"
            );
        }
        self.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: DriverEffect) {
        let api = Arc::clone(&self.api);
        match effect {
            DriverEffect::ClearConversation { conversation_id } => self.spawn_call(async move {
                let result = api.clear(&conversation_id).await;
                log_failure("clear", &conversation_id, result.as_ref().err());
                DriverEvent::Cleared {
                    conversation_id,
                    result,
                }
            }),

            DriverEffect::StartAnalysis { request } => self.spawn_call(async move {
                let conversation_id = request.conversation_id.clone().unwrap_or_default();
                let result = api.start(&request).await.map(|_| ());
                log_failure("start", &conversation_id, result.as_ref().err());
                DriverEvent::StartCompleted {
                    conversation_id,
                    result,
                }
            }),

            DriverEffect::FetchMessages { conversation_id } => self.spawn_call(async move {
                let result = api.fetch_messages(&conversation_id).await;
                log_failure("fetch_messages", &conversation_id, result.as_ref().err());
                DriverEvent::MessagesFetched {
                    conversation_id,
                    result,
                }
            }),

            DriverEffect::CheckAnalysis { conversation_id } => self.spawn_call(async move {
                let result = api.check_analysis(&conversation_id).await;
                log_failure("check_analysis", &conversation_id, result.as_ref().err());
                DriverEvent::AnalysisChecked {
                    conversation_id,
                    result,
                }
            }),

            DriverEffect::ArmTimer { timer, after } => self.scheduler.arm(timer, after),

            DriverEffect::DisarmAllTimers => {
                self.scheduler.disarm_all();
                // In-flight calls belong to the session being torn down
                self.cancel.cancel();
                self.cancel = CancellationToken::new();
            }

            DriverEffect::Notify(notice) => self.notify(notice),
        }
    }

    fn spawn_call(&mut self, call: impl Future<Output = DriverEvent> + Send + 'static) {
        let cancel = self.cancel.clone();
        self.calls.spawn(async move {
            tokio::select! {
                biased;

                () = cancel.cancelled() => None,
                event = call => Some(event),
            }
        });
    }

    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::error!(text = %notice.text, "Notice"),
            NoticeLevel::Warning => tracing::warn!(text = %notice.text, "Notice"),
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(text = %notice.text, "Notice");
            }
        }
        self.notices.push(notice);
    }
}

fn log_failure(call: &str, conversation_id: &str, error: Option<&ApiError>) {
    if let Some(e) = error {
        tracing::warn!(call, conversation_id, error = %e, status = ?e.status(), "Server call failed");
    }
}

fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

//! Trait abstractions for driver I/O
//!
//! These traits enable testing the executor with mock implementations.

use super::{ApiError, Timer};
use crate::api::StartAnalysisRequest;
use crate::store::{AnalysisStatus, Message};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// The conversation server as seen by the driver
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// Drop the server-side record
    async fn clear(&self, conversation_id: &str) -> Result<(), ApiError>;

    /// Issue the start call; returns the relayed webhook response
    async fn start(&self, request: &StartAnalysisRequest) -> Result<Value, ApiError>;

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError>;

    async fn check_analysis(&self, conversation_id: &str) -> Result<AnalysisStatus, ApiError>;
}

/// Identifies one arming of a timer. Ticks from an older arming are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub timer: Timer,
    pub generation: u64,
}

/// Timer bookkeeping
pub trait Scheduler: Send + Sync {
    /// Arm `timer`, replacing any previous arming
    fn arm(&self, timer: Timer, after: Duration);

    fn disarm(&self, timer: Timer);

    fn disarm_all(&self);

    /// The tick the current arming of `timer` delivers, if armed
    fn armed(&self, timer: Timer) -> Option<TimerTick>;

    fn is_current(&self, tick: TimerTick) -> bool {
        self.armed(tick.timer) == Some(tick)
    }
}

// ============================================================================
// Arc implementations for shared handles
// ============================================================================

#[async_trait]
impl<T: ConversationApi + ?Sized> ConversationApi for Arc<T> {
    async fn clear(&self, conversation_id: &str) -> Result<(), ApiError> {
        (**self).clear(conversation_id).await
    }

    async fn start(&self, request: &StartAnalysisRequest) -> Result<Value, ApiError> {
        (**self).start(request).await
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        (**self).fetch_messages(conversation_id).await
    }

    async fn check_analysis(&self, conversation_id: &str) -> Result<AnalysisStatus, ApiError> {
        (**self).check_analysis(conversation_id).await
    }
}

impl<T: Scheduler + ?Sized> Scheduler for Arc<T> {
    fn arm(&self, timer: Timer, after: Duration) {
        (**self).arm(timer, after);
    }

    fn disarm(&self, timer: Timer) {
        (**self).disarm(timer);
    }

    fn disarm_all(&self) {
        (**self).disarm_all();
    }

    fn armed(&self, timer: Timer) -> Option<TimerTick> {
        (**self).armed(timer)
    }
}

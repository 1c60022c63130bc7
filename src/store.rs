//! In-memory conversation store
//!
//! Keyed, TTL-bound storage of conversation state shared by every request
//! handler. Records idle longer than the TTL are evicted on the next sweep,
//! which runs both on a background tick and at the top of inbound requests.

mod clock;
mod sweeper;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sweeper::spawn_sweeper;
pub use types::*;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Shared conversation table with an injected clock and TTL
pub struct ConversationStore {
    records: RwLock<HashMap<String, ConversationRecord>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    /// Records removed by the most recent sweep
    last_sweep_removed: AtomicUsize,
}

impl ConversationStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
            ttl,
            last_sweep_removed: AtomicUsize::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Instant at which a record idle since `last_updated` becomes evictable
    pub fn expires_at(&self, last_updated: DateTime<Utc>) -> DateTime<Utc> {
        last_updated
            .checked_add_signed(chrono_ttl(self.ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Snapshot of a conversation; missing ids yield an empty record
    pub async fn get(&self, id: &str) -> ConversationRecord {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_else(|| ConversationRecord::empty(id))
    }

    pub async fn messages(&self, id: &str) -> Vec<Message> {
        self.records
            .read()
            .await
            .get(id)
            .map(|r| r.messages.clone())
            .unwrap_or_default()
    }

    pub async fn analysis_status(&self, id: &str) -> AnalysisStatus {
        self.records
            .read()
            .await
            .get(id)
            .map_or_else(
                || ConversationRecord::empty(id).analysis_status(),
                ConversationRecord::analysis_status,
            )
    }

    /// Append one message, creating the record if needed.
    ///
    /// Identical messages are appended again; callers must not double-submit.
    pub async fn append_message(&self, id: &str, message: Message) -> ConversationRecord {
        self.append_messages(id, std::iter::once(message)).await
    }

    /// Append several messages in order under a single write
    pub async fn append_messages(
        &self,
        id: &str,
        messages: impl IntoIterator<Item = Message>,
    ) -> ConversationRecord {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let record = records
            .entry(id.to_string())
            .or_insert_with(|| ConversationRecord::new(id, now));
        record.messages.extend(messages);
        record.touch(now);
        record.clone()
    }

    /// Reset a conversation to an empty, non-completed record
    pub async fn clear(&self, id: &str) {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let record = records
            .entry(id.to_string())
            .or_insert_with(|| ConversationRecord::new(id, now));
        record.messages.clear();
        record.analysis_result = None;
        record.analysis_completed = false;
        record.touch(now);
    }

    /// Record the analysis report and mark the conversation completed
    pub async fn set_analysis_result(&self, id: &str, text: impl Into<String>) {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let record = records
            .entry(id.to_string())
            .or_insert_with(|| ConversationRecord::new(id, now));
        record.analysis_result = Some(text.into());
        record.analysis_completed = true;
        record.touch(now);
    }

    /// Remove every record with `now - last_updated > ttl`
    pub async fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let ttl = chrono_ttl(ttl);
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| now - record.last_updated <= ttl);
        let removed = before - records.len();
        drop(records);

        self.last_sweep_removed.store(removed, Ordering::Relaxed);
        if removed > 0 {
            tracing::info!(removed, "Cleaned up expired conversations");
        }
        removed
    }

    /// Sweep using the store's own clock and TTL
    pub async fn sweep(&self) -> usize {
        self.sweep_expired(self.clock.now(), self.ttl).await
    }

    pub async fn stats(&self) -> StoreStats {
        let records = self.records.read().await;
        #[allow(clippy::cast_precision_loss)] // TTLs are far below 2^52 ms
        let expiration_time_hours = self.ttl.as_millis() as f64 / 3_600_000.0;
        StoreStats {
            total_conversations: records.len(),
            oldest_conversation: records.values().map(|r| r.last_updated).min(),
            expiration_time_hours,
            cleaned_in_last_run: self.last_sweep_removed.load(Ordering::Relaxed),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.records.read().await.contains_key(id)
    }
}

fn chrono_ttl(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX)
}

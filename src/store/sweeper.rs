//! Background expiry sweep

use super::ConversationStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Spawn the recurring sweep task. Stops when `shutdown` is cancelled.
pub fn spawn_sweeper(
    store: Arc<ConversationStore>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = store.sweep().await;
                    tracing::debug!(removed, "Background sweep finished");
                }
            }
        }
        tracing::info!("Conversation sweeper stopped");
    })
}

//! Tokio-backed timers
//!
//! Each armed timer is a spawned task that sends [`TimerTick`]s down a channel
//! until its cancellation token fires. Re-arming bumps the generation so ticks
//! already queued from the old arming are recognised as stale.

use super::traits::{Scheduler, TimerTick};
use super::Timer;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

struct Slot {
    generation: u64,
    cancel: CancellationToken,
}

pub struct TokioScheduler {
    ticks: mpsc::Sender<TimerTick>,
    slots: Mutex<HashMap<Timer, Slot>>,
    next_generation: AtomicU64,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver its ticks arrive on
    pub fn new() -> (Self, mpsc::Receiver<TimerTick>) {
        let (tx, rx) = mpsc::channel(32);
        let scheduler = Self {
            ticks: tx,
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        };
        (scheduler, rx)
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<Timer, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for TokioScheduler {
    fn arm(&self, timer: Timer, after: Duration) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let tick = TimerTick { timer, generation };
        let tx = self.ticks.clone();
        let token = cancel.clone();
        let period = after.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            // A stalled consumer gets one late tick, not a burst of catch-up ticks
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        if tx.send(tick).await.is_err() || !timer.repeats() {
                            break;
                        }
                    }
                }
            }
        });

        if let Some(old) = self.slots().insert(timer, Slot { generation, cancel }) {
            old.cancel.cancel();
        }
        tracing::debug!(?timer, generation, after_ms = %after.as_millis(), "Timer armed");
    }

    fn disarm(&self, timer: Timer) {
        if let Some(slot) = self.slots().remove(&timer) {
            slot.cancel.cancel();
        }
    }

    fn disarm_all(&self) {
        for (_, slot) in self.slots().drain() {
            slot.cancel.cancel();
        }
    }

    fn armed(&self, timer: Timer) -> Option<TimerTick> {
        self.slots().get(&timer).map(|slot| TimerTick {
            timer,
            generation: slot.generation,
        })
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.disarm_all();
    }
}

//! Background triggers that enqueue work.
//!
//! Both helpers take a plain callback; callers typically close over a
//! [`crate::Scheduler`] and a job and call `enqueue` inside it, so the
//! scheduler's dedupe absorbs overlapping triggers.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Fire `on_up` once at start if the network is already up, then on every
/// `false -> true` transition. Ends when the sender is dropped.
pub fn spawn_on_network_available<F>(mut network: watch::Receiver<bool>, mut on_up: F) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut was_up = *network.borrow_and_update();
        if was_up {
            debug!("network available at start; triggering");
            on_up();
        }
        while network.changed().await.is_ok() {
            let up = *network.borrow_and_update();
            if up && !was_up {
                debug!("network became available; triggering");
                on_up();
            }
            was_up = up;
        }
    })
}

/// Fire `on_tick` every `interval`. The first tick lands one full interval
/// after the call.
///
/// A zero interval, or one too large to schedule, never fires; the task
/// logs a warning and ends.
pub fn spawn_periodic<F>(interval: Duration, mut on_tick: F) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let start = match tokio::time::Instant::now().checked_add(interval) {
            Some(start) if !interval.is_zero() => start,
            _ => {
                warn!(
                    interval_secs = interval.as_secs(),
                    "periodic trigger disabled: unschedulable interval"
                );
                return;
            }
        };
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!(interval_ms = interval.as_millis() as u64, "periodic trigger");
            on_tick();
        }
    })
}

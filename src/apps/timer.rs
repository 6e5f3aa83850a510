//! # Kill-retry timer for transition states.
//!
//! A [`TransitionTimer`] is armed whenever an instance enters a transition
//! state. Each time the period elapses it emits a tick carrying the
//! instance id; the manager reacts to a tick by invoking the life handler's
//! `kill`. The timer keeps ticking after an expiry — the semantics are
//! "keep killing until the app actually leaves the transition state".
//!
//! ## Rules
//! - The timer is a scoped resource: dropping the guard cancels the
//!   background task on every exit path, including abnormal teardown of the
//!   owning instance.
//! - Rearming is "cancel then schedule": starting a new timer replaces the
//!   old guard, which cancels the old task on drop.
//! - Ticks are delivered over an unbounded channel and never block the
//!   timer task.

use std::time::Duration;

use tokio::{select, sync::mpsc, time};
use tokio_util::sync::CancellationToken;

/// Sending half of the kill-tick channel; each tick carries an instance id.
pub type TickSender = mpsc::UnboundedSender<String>;

/// Receiving half of the kill-tick channel, owned by the manager loop.
pub type TickReceiver = mpsc::UnboundedReceiver<String>;

/// Creates a connected kill-tick channel.
pub fn tick_channel() -> (TickSender, TickReceiver) {
    mpsc::unbounded_channel()
}

/// Guard for one armed transition deadline.
pub struct TransitionTimer {
    cancel: CancellationToken,
}

impl TransitionTimer {
    /// Arms a timer that emits a tick for `instance_id` every `period`
    /// until cancelled.
    pub fn start(instance_id: String, period: Duration, ticks: TickSender) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            loop {
                select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = time::sleep(period) => {
                        if ticks.send(instance_id.clone()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self { cancel }
    }
}

impl Drop for TransitionTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

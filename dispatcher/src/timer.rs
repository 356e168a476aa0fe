//! Cancellable phase timer.

use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// Delivered when an armed deadline is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub generation: u64,
}

/// At most one pending sleep. Re-arming or cancelling aborts the previous
/// one, and so does dropping the timer.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    pending: Option<(u64, JoinHandle<()>)>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a [`TimerFired`] for `generation` at `deadline`, replacing
    /// any pending one.
    pub fn arm(&mut self, generation: u64, deadline: Instant, tx: Sender<TimerFired>) {
        self.cancel();
        trace!(generation, "phase timer armed");

        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            // Receiver gone means the runtime has stopped.
            let _ = tx.send(TimerFired { generation }).await;
        });
        self.pending = Some((generation, handle));
    }

    /// Aborts the pending sleep. Safe to call when nothing is armed.
    pub fn cancel(&mut self) {
        if let Some((generation, handle)) = self.pending.take() {
            handle.abort();
            trace!(generation, "phase timer cancelled");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    pub fn armed_generation(&self) -> Option<u64> {
        self.pending.as_ref().map(|(generation, _)| *generation)
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility. Never read by the engine
/// itself.
#[derive(Clone, Default, Debug)]
pub struct Counters {
    pub events_detected: Arc<AtomicU64>,
    pub events_received: Arc<AtomicU64>,

    pub enqueued: Arc<AtomicU64>,
    pub dropped_disabled: Arc<AtomicU64>,
    pub presented: Arc<AtomicU64>,
    pub completed: Arc<AtomicU64>,
    pub dismissed: Arc<AtomicU64>,

    // errors
    pub detection_errors: Arc<AtomicU64>,
    pub wire_errors: Arc<AtomicU64>,
    pub persistence_errors: Arc<AtomicU64>,

    pub stale_timer_fires: Arc<AtomicU64>,
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub events_detected: u64,
    pub events_received: u64,
    pub enqueued: u64,
    pub dropped_disabled: u64,
    pub presented: u64,
    pub completed: u64,
    pub dismissed: u64,
    pub detection_errors: u64,
    pub wire_errors: u64,
    pub persistence_errors: u64,
    pub stale_timer_fires: u64,
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn bump_by(counter: &AtomicU64, n: usize) {
    counter.fetch_add(n as u64, Ordering::Relaxed);
}

impl Counters {
    pub fn snapshot(&self) -> CounterSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            events_detected: get(&self.events_detected),
            events_received: get(&self.events_received),
            enqueued: get(&self.enqueued),
            dropped_disabled: get(&self.dropped_disabled),
            presented: get(&self.presented),
            completed: get(&self.completed),
            dismissed: get(&self.dismissed),
            detection_errors: get(&self.detection_errors),
            wire_errors: get(&self.wire_errors),
            persistence_errors: get(&self.persistence_errors),
            stale_timer_fires: get(&self.stale_timer_fires),
        }
    }
}

//! Timed state machine stepping through one event's phases.

use std::time::Duration;

use market::event::EventId;
use tokio::time::Instant;

use crate::phases::{PhaseSpec, PhaseTable};

/// Result of advancing a machine to a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStep {
    /// Still inside the same phase.
    Unchanged,
    /// Moved into a later phase; intermediate phases may have been skipped.
    Entered { index: usize, name: &'static str },
    /// Every phase has elapsed. Returned exactly once.
    Completed,
}

/// Phase timeline of the current presentation.
///
/// The machine never sleeps itself: the owner asks for
/// [`next_deadline`](Self::next_deadline), waits for it, then calls
/// [`advance`](Self::advance). Deadlines are measured from the start instant,
/// so late wake-ups do not push later phases back.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    event_id: EventId,
    table: PhaseTable,
    started_at: Instant,
    index: usize,
    completed: bool,
}

impl PhaseMachine {
    /// Enters phase 0 immediately.
    pub fn start(event_id: EventId, table: PhaseTable, now: Instant) -> Self {
        Self {
            event_id,
            table,
            started_at: now,
            index: 0,
            completed: false,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn table(&self) -> &PhaseTable {
        &self.table
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn phase_index(&self) -> usize {
        self.index
    }

    /// The phase being shown, or `None` once completed.
    pub fn active_phase(&self) -> Option<&PhaseSpec> {
        if self.completed {
            return None;
        }
        self.table.get(self.index)
    }

    /// When the active phase ends.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.completed {
            return None;
        }
        Some(self.started_at + self.phase_end(self.index))
    }

    pub fn advance(&mut self, now: Instant) -> PhaseStep {
        if self.completed {
            return PhaseStep::Unchanged;
        }

        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed >= self.table.total() {
            self.completed = true;
            return PhaseStep::Completed;
        }

        let mut index = self.index;
        while elapsed >= self.phase_end(index) {
            index += 1;
        }

        if index == self.index {
            return PhaseStep::Unchanged;
        }

        self.index = index;
        let name = self.table.get(index).map(|p| p.name).unwrap_or_default();
        PhaseStep::Entered { index, name }
    }

    /// Offset from the start at which phase `index` ends.
    fn phase_end(&self, index: usize) -> Duration {
        self.table
            .phases()
            .iter()
            .take(index + 1)
            .map(|p| p.duration)
            .sum()
    }
}

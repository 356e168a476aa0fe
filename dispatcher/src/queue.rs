//! FIFO event queue with a single "current" slot.

use std::collections::VecDeque;

use market::event::{Event, EventPayload};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::machine::{PhaseMachine, PhaseStep};
use crate::phases::{PhaseSpec, PhaseTables};

/// The event being presented and its phase timeline.
#[derive(Debug, Clone)]
pub struct Presentation {
    pub event: Event,
    pub machine: PhaseMachine,
    /// Tags timers armed for this presentation.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Promoted straight into the current slot.
    Presenting,
    /// Waiting behind the current event; `position` is 1-based.
    Queued { position: usize },
    /// Events are disabled.
    Dropped,
}

/// What a timer fire or dismissal did to the current slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Nothing changed (stale generation, or still mid-phase).
    Ignored,
    /// The current presentation moved to another phase.
    Phase { index: usize, name: &'static str },
    /// The current presentation ended; `next` is the promoted event, if any.
    Finished { finished: Event, next: Option<Event> },
}

/// Strict FIFO dispatcher. Holds at most one current event; the queue never
/// contains it, and the queue is empty whenever nothing is current.
#[derive(Debug)]
pub struct Dispatcher {
    enabled: bool,
    queue: VecDeque<Event>,
    current: Option<Presentation>,
    tables: PhaseTables,
    generation: u64,
}

impl Dispatcher {
    pub fn new(tables: PhaseTables, enabled: bool) -> Self {
        Self {
            enabled,
            queue: VecDeque::new(),
            current: None,
            tables,
            generation: 0,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Turning events off keeps whatever is current or queued; it only stops
    /// new events from being accepted.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn current(&self) -> Option<&Presentation> {
        self.current.as_ref()
    }

    pub fn current_event(&self) -> Option<&Event> {
        self.current.as_ref().map(|p| &p.event)
    }

    pub fn active_phase(&self) -> Option<&PhaseSpec> {
        self.current.as_ref().and_then(|p| p.machine.active_phase())
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Event> {
        self.queue.iter()
    }

    /// Generation of the live presentation, if any.
    pub fn generation(&self) -> Option<u64> {
        self.current.as_ref().map(|p| p.generation)
    }

    /// When the live presentation next needs a timer fire.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.current.as_ref().and_then(|p| p.machine.next_deadline())
    }

    pub fn enqueue(&mut self, event: Event, now: Instant) -> EnqueueOutcome {
        if !self.enabled {
            debug!(event_id = %event.id, kind = %event.event_type(), "events disabled, dropping");
            return EnqueueOutcome::Dropped;
        }

        let outcome = if self.current.is_none() {
            self.present(event, now);
            EnqueueOutcome::Presenting
        } else {
            debug!(event_id = %event.id, kind = %event.event_type(), "queued");
            self.queue.push_back(event);
            EnqueueOutcome::Queued {
                position: self.queue.len(),
            }
        };

        self.check_invariant();
        outcome
    }

    /// Builds an event from `payload` and enqueues it like a detected one.
    pub fn trigger_manual(&mut self, payload: EventPayload, now: Instant) -> (Event, EnqueueOutcome) {
        let event = Event::new(payload);
        info!(event_id = %event.id, kind = %event.event_type(), "manual trigger");
        let outcome = self.enqueue(event.clone(), now);
        (event, outcome)
    }

    /// Ends the current presentation and promotes the head of the queue.
    ///
    /// Returns `None` when nothing was current.
    pub fn dismiss_current(&mut self, now: Instant) -> Option<Transition> {
        let finished = self.current.take()?.event;
        info!(event_id = %finished.id, kind = %finished.event_type(), "dismissed");

        let next = self.queue.pop_front().map(|event| {
            self.present(event.clone(), now);
            event
        });

        self.check_invariant();
        Some(Transition::Finished { finished, next })
    }

    /// Handles a phase timer firing for `generation`.
    pub fn on_timer(&mut self, generation: u64, now: Instant) -> Transition {
        let Some(current) = self.current.as_mut() else {
            return Transition::Ignored;
        };
        if current.generation != generation {
            debug!(
                fired = generation,
                live = current.generation,
                "stale phase timer ignored"
            );
            return Transition::Ignored;
        }

        match current.machine.advance(now) {
            PhaseStep::Unchanged => Transition::Ignored,
            PhaseStep::Entered { index, name } => {
                debug!(event_id = %current.event.id, phase = name, "phase entered");
                Transition::Phase { index, name }
            }
            PhaseStep::Completed => {
                info!(event_id = %current.event.id, "presentation completed");
                self.dismiss_current(now).unwrap_or(Transition::Ignored)
            }
        }
    }

    /// Empties the queue and the current slot, e.g. on teardown.
    pub fn clear(&mut self) {
        self.current = None;
        self.queue.clear();
    }

    fn present(&mut self, event: Event, now: Instant) {
        self.generation += 1;
        let table = self.tables.table_for(event.event_type());
        let machine = PhaseMachine::start(event.id, table, now);
        info!(
            event_id = %event.id,
            kind = %event.event_type(),
            generation = self.generation,
            "presenting"
        );
        self.current = Some(Presentation {
            event,
            machine,
            generation: self.generation,
        });
    }

    fn check_invariant(&self) {
        debug_assert!(
            self.current.is_some() || self.queue.is_empty(),
            "queue non-empty with nothing current"
        );
        debug_assert!(
            self.current
                .as_ref()
                .is_none_or(|c| self.queue.iter().all(|e| e.id != c.event.id)),
            "current event also queued"
        );
    }
}

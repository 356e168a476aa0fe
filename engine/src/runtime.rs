//! The single logical event loop.
//!
//! One spawned task owns the event source, the dispatcher and the phase
//! timer. Every mutation arrives as a [`Command`] or a [`TimerFired`] and is
//! handled to completion before the next one; the view is published and the
//! timer re-armed before any reply is sent.

use std::sync::Arc;

use common::logger::{TraceId, root_span, warn_if_slow};
use dispatcher::{Dispatcher, EnqueueOutcome, PhaseTimer, TimerFired, Transition};
use market::detector::EventSource;
use market::error::DetectionError;
use market::event::{Event, EventPayload};
use market::wire::TransportMessage;
use settings::store::SLOW_IO;
use settings::{EngineSettings, SettingsStore};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{Instrument, debug, info, instrument, warn};

use crate::metrics::Counters;
use crate::metrics::counters::{bump, bump_by};
use crate::view::EngineView;

/// Timer fires in flight at once; only one timer is ever armed.
const TIMER_CHANNEL_CAPACITY: usize = 4;

pub(crate) enum Command {
    Ingest {
        msg: TransportMessage,
        reply: Option<oneshot::Sender<IngestReport>>,
    },
    Enqueue {
        event: Event,
        reply: oneshot::Sender<EnqueueOutcome>,
    },
    TriggerManual {
        payload: EventPayload,
        reply: oneshot::Sender<Event>,
    },
    SetEnabled {
        enabled: bool,
        reply: oneshot::Sender<()>,
    },
    Dismiss {
        reply: oneshot::Sender<Option<Event>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// What one ingested transport message produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Events produced by detection or accepted from the transport.
    pub events: usize,
    pub enqueued: usize,
    pub dropped: usize,
    pub errors: usize,
}

pub(crate) struct Runtime {
    source: Box<dyn EventSource>,
    dispatcher: Dispatcher,
    timer: PhaseTimer,
    armed: Option<(u64, Instant)>,
    timer_tx: mpsc::Sender<TimerFired>,
    store: Arc<dyn SettingsStore>,
    view_tx: watch::Sender<EngineView>,
    counters: Counters,
}

impl Runtime {
    /// Spawns the loop and returns the command sender.
    pub(crate) fn spawn(
        source: Box<dyn EventSource>,
        dispatcher: Dispatcher,
        store: Arc<dyn SettingsStore>,
        view_tx: watch::Sender<EngineView>,
        counters: Counters,
        capacity: usize,
    ) -> mpsc::Sender<Command> {
        let (cmd_tx, cmd_rx) = mpsc::channel(capacity);
        let (timer_tx, timer_rx) = mpsc::channel(TIMER_CHANNEL_CAPACITY);

        let runtime = Self {
            source,
            dispatcher,
            timer: PhaseTimer::new(),
            armed: None,
            timer_tx,
            store,
            view_tx,
            counters,
        };
        runtime.publish();

        tokio::spawn(runtime.run(cmd_rx, timer_rx).in_current_span());
        cmd_tx
    }

    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut timer_rx: mpsc::Receiver<TimerFired>,
    ) {
        info!(mode = %self.source.mode(), enabled = self.dispatcher.enabled(), "engine runtime started");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        self.teardown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle(cmd).await,
                    None => {
                        debug!("all engine handles dropped");
                        self.teardown();
                        break;
                    }
                },
                Some(fired) = timer_rx.recv() => {
                    self.on_timer(fired);
                    self.settle();
                }
            }
        }

        info!("engine runtime stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Ingest { msg, reply } => {
                let report = self.ingest(msg);
                self.settle();
                if let Some(reply) = reply {
                    let _ = reply.send(report);
                }
            }
            Command::Enqueue { event, reply } => {
                let outcome = self.enqueue(event);
                self.settle();
                let _ = reply.send(outcome);
            }
            Command::TriggerManual { payload, reply } => {
                let (event, outcome) = self.dispatcher.trigger_manual(payload, Instant::now());
                self.count_outcome(&event, outcome);
                self.settle();
                let _ = reply.send(event);
            }
            Command::SetEnabled { enabled, reply } => {
                self.set_enabled(enabled).await;
                self.settle();
                let _ = reply.send(());
            }
            Command::Dismiss { reply } => {
                let finished = match self.dispatcher.dismiss_current(Instant::now()) {
                    Some(Transition::Finished { finished, next }) => {
                        bump(&self.counters.dismissed);
                        if next.is_some() {
                            bump(&self.counters.presented);
                        }
                        Some(finished)
                    }
                    _ => None,
                };
                self.settle();
                let _ = reply.send(finished);
            }
            // Handled by the loop.
            Command::Shutdown { .. } => {}
        }
    }

    fn ingest(&mut self, msg: TransportMessage) -> IngestReport {
        let span = root_span("ingest", &TraceId::new());
        let _guard = span.enter();

        let mut report = IngestReport::default();
        let events = match msg {
            TransportMessage::Snapshots(batch) => {
                if let [single] = batch.snapshots.as_slice() {
                    span.record("ticker", single.ticker.as_str());
                }
                self.record_errors(&batch.rejected, &mut report);
                let detection = if batch.complete {
                    self.source.on_snapshots(&batch.snapshots)
                } else {
                    self.source.on_update(&batch.snapshots)
                };
                self.record_errors(&detection.errors, &mut report);
                bump_by(&self.counters.events_detected, detection.events.len());
                detection.events
            }
            TransportMessage::MarketState(state) => {
                let events = self.source.on_market_state(state);
                bump_by(&self.counters.events_detected, events.len());
                events
            }
            TransportMessage::Event(event) => {
                span.record("event_id", tracing::field::display(event.id));
                match self.source.on_pushed(event) {
                    Some(event) => {
                        bump(&self.counters.events_received);
                        vec![event]
                    }
                    None => Vec::new(),
                }
            }
            TransportMessage::Rejected { reason } => {
                warn!(%reason, "transport frame rejected");
                bump(&self.counters.wire_errors);
                report.errors += 1;
                Vec::new()
            }
        };

        report.events = events.len();
        for event in events {
            match self.enqueue(event) {
                EnqueueOutcome::Dropped => report.dropped += 1,
                _ => report.enqueued += 1,
            }
        }
        report
    }

    fn record_errors(&self, errors: &[DetectionError], report: &mut IngestReport) {
        for err in errors {
            warn!(ticker = err.ticker().unwrap_or("?"), error = %err, "snapshot rejected");
        }
        report.errors += errors.len();
        bump_by(&self.counters.detection_errors, errors.len());
    }

    fn enqueue(&mut self, event: Event) -> EnqueueOutcome {
        let outcome = self.dispatcher.enqueue(event.clone(), Instant::now());
        self.count_outcome(&event, outcome);
        outcome
    }

    fn count_outcome(&self, event: &Event, outcome: EnqueueOutcome) {
        match outcome {
            EnqueueOutcome::Presenting => {
                bump(&self.counters.enqueued);
                bump(&self.counters.presented);
            }
            EnqueueOutcome::Queued { position } => {
                bump(&self.counters.enqueued);
                debug!(event_id = %event.id, position, "event waiting");
            }
            EnqueueOutcome::Dropped => {
                bump(&self.counters.dropped_disabled);
                info!(event_id = %event.id, kind = %event.event_type(), "event dropped while disabled");
            }
        }
    }

    #[instrument(skip(self))]
    async fn set_enabled(&mut self, enabled: bool) {
        if self.dispatcher.enabled() != enabled {
            info!(enabled, "events toggled");
        }
        self.dispatcher.set_enabled(enabled);

        let settings = EngineSettings::new(enabled);
        if let Err(err) = warn_if_slow("settings.save", SLOW_IO, self.store.save(&settings)).await {
            bump(&self.counters.persistence_errors);
            warn!(error = %err, enabled, "failed to persist settings, keeping in-memory flag");
        }
    }

    fn on_timer(&mut self, fired: TimerFired) {
        // The sleep behind `armed` has completed; any live deadline needs a
        // fresh one.
        if self.armed.is_some_and(|(generation, _)| generation == fired.generation) {
            self.armed = None;
        }

        if self.dispatcher.generation() != Some(fired.generation) {
            bump(&self.counters.stale_timer_fires);
            debug!(generation = fired.generation, "stale timer fire discarded");
            return;
        }

        match self.dispatcher.on_timer(fired.generation, Instant::now()) {
            Transition::Finished { finished, next } => {
                bump(&self.counters.completed);
                debug!(event_id = %finished.id, "presentation finished on timer");
                if next.is_some() {
                    bump(&self.counters.presented);
                }
            }
            Transition::Phase { index, name } => {
                debug!(index, phase = name, "phase advanced");
            }
            Transition::Ignored => {}
        }
    }

    /// Re-arms the timer for the live presentation and publishes the view.
    fn settle(&mut self) {
        self.sync_timer();
        self.publish();
    }

    fn sync_timer(&mut self) {
        let wanted = self.dispatcher.generation().zip(self.dispatcher.next_deadline());
        if wanted == self.armed {
            return;
        }

        match wanted {
            Some((generation, deadline)) => {
                self.timer.arm(generation, deadline, self.timer_tx.clone());
            }
            None => self.timer.cancel(),
        }
        self.armed = wanted;
    }

    fn publish(&self) {
        let view = EngineView::of(&self.dispatcher);
        debug_assert!(view.current.is_some() || view.pending == 0);
        self.view_tx.send_if_modified(|old| {
            if *old == view {
                return false;
            }
            *old = view;
            true
        });
    }

    fn teardown(&mut self) {
        self.timer.cancel();
        self.armed = None;
        self.dispatcher.clear();
        self.publish();
    }
}

//! Public handle to a running engine.

use std::sync::Arc;

use dispatcher::{Dispatcher, EnqueueOutcome};
use market::detector::source_for;
use market::event::{Event, EventPayload};
use market::wire::{TransportMessage, WireEvent, normalize_event};
use settings::{SettingsStore, load_enabled};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metrics::Counters;
use crate::metrics::counters::bump;
use crate::runtime::{Command, IngestReport, Runtime};
use crate::view::{ActivePhase, EngineView};

/// Cheap to clone. The runtime stops when [`shutdown`](Self::shutdown) is
/// called or every handle is dropped; after that every call returns
/// [`EngineError::Stopped`].
#[derive(Clone)]
pub struct EngineFacade {
    cmd_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<EngineView>,
    counters: Counters,
}

impl EngineFacade {
    /// Loads the persisted flag and spawns the runtime.
    pub async fn start(config: EngineConfig, store: Arc<dyn SettingsStore>) -> Self {
        let enabled = load_enabled(store.as_ref(), config.events_enabled_default).await;
        info!(enabled, mode = %config.detection_mode, "starting engine");

        let source = source_for(config.detection_mode, config.detector_config());
        let dispatcher = Dispatcher::new(config.phase_tables(), enabled);
        let counters = Counters::default();
        let (view_tx, view_rx) = watch::channel(EngineView {
            enabled,
            ..EngineView::default()
        });

        let cmd_tx = Runtime::spawn(
            source,
            dispatcher,
            store,
            view_tx,
            counters.clone(),
            config.command_queue_capacity,
        );

        Self {
            cmd_tx,
            view_rx,
            counters,
        }
    }

    pub fn current_event(&self) -> Option<Event> {
        self.view_rx.borrow().current.clone()
    }

    pub fn active_phase(&self) -> Option<ActivePhase> {
        self.view_rx.borrow().phase.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.view_rx.borrow().pending
    }

    pub fn enabled(&self) -> bool {
        self.view_rx.borrow().enabled
    }

    pub fn view(&self) -> EngineView {
        self.view_rx.borrow().clone()
    }

    /// Receiver updated after every state change.
    pub fn subscribe(&self) -> watch::Receiver<EngineView> {
        self.view_rx.clone()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Toggles the flag and persists it. Persistence failures are logged and
    /// the in-memory flag still changes.
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        self.request(|reply| Command::SetEnabled { enabled, reply })
            .await
    }

    /// Ends the current presentation early. Returns the dismissed event.
    pub async fn dismiss(&self) -> Result<Option<Event>, EngineError> {
        self.request(|reply| Command::Dismiss { reply }).await
    }

    /// Enqueues an event built from `payload`, bypassing detection.
    pub async fn trigger_manual(&self, payload: EventPayload) -> Result<Event, EngineError> {
        self.request(|reply| Command::TriggerManual { payload, reply })
            .await
    }

    /// Like [`trigger_manual`](Self::trigger_manual), from the transport's
    /// event shape.
    pub async fn trigger_manual_wire(&self, wire: WireEvent) -> Result<Event, EngineError> {
        let payload = normalize_event(wire).inspect_err(|e| {
            bump(&self.counters.wire_errors);
            warn!(error = %e, "manual trigger rejected");
        })?;
        self.trigger_manual(payload).await
    }

    pub async fn enqueue(&self, event: Event) -> Result<EnqueueOutcome, EngineError> {
        self.request(|reply| Command::Enqueue { event, reply })
            .await
    }

    /// Runs one transport message through detection and dispatch.
    pub async fn ingest(&self, msg: TransportMessage) -> Result<IngestReport, EngineError> {
        self.request(|reply| Command::Ingest {
            msg,
            reply: Some(reply),
        })
        .await
    }

    /// Forwards every message from `rx` into the runtime until either side
    /// goes away. The forwarder does not keep the runtime alive.
    pub fn connect_feed(&self, mut rx: mpsc::Receiver<TransportMessage>) -> JoinHandle<()> {
        let weak = self.cmd_tx.downgrade();

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let Some(cmd_tx) = weak.upgrade() else {
                    break;
                };
                if cmd_tx
                    .send(Command::Ingest { msg, reply: None })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            debug!("feed forwarder finished");
        })
    }

    /// Cancels the phase timer and stops the runtime. Idempotent.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        match self.request(|reply| Command::Shutdown { reply }).await {
            Ok(()) | Err(EngineError::Stopped) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply))
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)
    }
}

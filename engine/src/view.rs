use dispatcher::Dispatcher;
use market::event::Event;

/// Phase of the current presentation, as shown to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePhase {
    pub name: &'static str,
    pub index: usize,
    /// Number of phases in the current event's table.
    pub count: usize,
}

/// What the renderer needs after every state change.
///
/// `current == None` implies `pending == 0` in every published view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineView {
    pub current: Option<Event>,
    pub phase: Option<ActivePhase>,
    pub pending: usize,
    pub enabled: bool,
}

impl EngineView {
    pub(crate) fn of(dispatcher: &Dispatcher) -> Self {
        let current = dispatcher.current();
        let phase = current.and_then(|p| {
            p.machine.active_phase().map(|spec| ActivePhase {
                name: spec.name,
                index: p.machine.phase_index(),
                count: p.machine.table().len(),
            })
        });

        Self {
            current: current.map(|p| p.event.clone()),
            phase,
            pending: dispatcher.pending_count(),
            enabled: dispatcher.enabled(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }
}

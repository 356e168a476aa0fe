pub mod machine;
pub mod phases;
pub mod queue;
pub mod timer;

pub use machine::{PhaseMachine, PhaseStep};
pub use phases::{PhaseSpec, PhaseTable, PhaseTables};
pub use queue::{Dispatcher, EnqueueOutcome, Presentation, Transition};
pub use timer::{PhaseTimer, TimerFired};

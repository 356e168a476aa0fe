pub mod config;
pub mod error;
pub mod facade;
pub mod metrics;
pub mod runtime;
pub mod view;

pub use config::EngineConfig;
pub use error::EngineError;
pub use facade::EngineFacade;
pub use runtime::IngestReport;
pub use view::{ActivePhase, EngineView};

use market::error::WireError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine runtime has stopped")]
    Stopped,

    #[error("invalid event: {0}")]
    InvalidEvent(#[from] WireError),
}

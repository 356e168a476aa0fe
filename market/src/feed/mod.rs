//! Transport collaborators delivering messages into the engine.
//!
//! Feeds never classify anything themselves; they decode frames with
//! [`crate::wire`] and forward them over an mpsc channel.

pub mod poller;
pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::error::TransportError;
use crate::wire::TransportMessage;

pub use poller::HttpPoller;
pub use ws::WsFeed;

#[async_trait]
pub trait Feed: Send + Sync {
    /// Runs until the receiving side of `tx` is dropped.
    ///
    /// Interruptions are retried internally; an error is only returned when
    /// the feed cannot be set up at all.
    async fn run(&self, tx: Sender<TransportMessage>) -> Result<(), TransportError>;
}

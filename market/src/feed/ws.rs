use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc::Sender;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, instrument, warn};

use super::Feed;
use crate::error::TransportError;
use crate::wire::{self, TransportMessage};

/// Push transport: a WebSocket that streams snapshots, market-state
/// signals and pre-classified events as JSON text frames.
pub struct WsFeed {
    pub ws_url: String,
    pub reconnect_delay: Duration,
}

impl WsFeed {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect_delay: Duration::from_secs(3),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Forwards a decoded frame, or a rejection for one that fails to
    /// decode. Returns false once the receiver is gone.
    async fn forward(text: &str, tx: &Sender<TransportMessage>) -> bool {
        let msg = match wire::decode(text) {
            Ok(Some(msg)) => msg,
            Ok(None) => return true,
            Err(e) => {
                warn!(error = %e, "undecodable frame");
                TransportMessage::Rejected {
                    reason: e.to_string(),
                }
            }
        };
        tx.send(msg).await.is_ok()
    }

    /// Reads one connection until it ends. Returns false once the receiver
    /// is gone.
    async fn pump(&self, tx: &Sender<TransportMessage>) -> Result<bool, TransportError> {
        let (ws, _) = connect_async(self.ws_url.as_str()).await?;
        info!(url = %self.ws_url, "feed connected");

        let (_write, mut read) = ws.split();

        while let Some(frame) = read.next().await {
            let frame = frame?;

            if !frame.is_text() {
                continue;
            }

            let text = frame.to_text()?;
            if !Self::forward(text, tx).await {
                return Ok(false);
            }
        }

        debug!("feed stream ended");
        Ok(true)
    }
}

#[async_trait]
impl Feed for WsFeed {
    #[instrument(skip(self, tx), fields(url = %self.ws_url))]
    async fn run(&self, tx: Sender<TransportMessage>) -> Result<(), TransportError> {
        loop {
            match self.pump(&tx).await {
                Ok(false) => {
                    info!("engine gone; websocket feed stopping");
                    return Ok(());
                }
                Ok(true) => {}
                Err(e) => warn!(error = %e, "websocket feed interrupted"),
            }

            if tx.is_closed() {
                return Ok(());
            }

            debug!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "reconnecting"
            );
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }
}

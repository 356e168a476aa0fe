//! Pull transport.
//!
//! Polls the exchange's REST API on a fixed cadence and turns every round
//! into a `stocks_update` batch followed by a `market_state` signal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::mpsc::Sender;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};

use super::Feed;
use crate::error::TransportError;
use crate::types::MarketState;
use crate::wire::{TransportMessage, decode_batch};

#[derive(Clone)]
pub struct HttpPoller {
    http: Client,
    base_url: String,
    poll_every: Duration,
}

impl HttpPoller {
    pub fn new(base_url: impl Into<String>, poll_every: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_every,
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_stocks(&self) -> Result<Vec<Value>, TransportError> {
        let url = format!("{}/stocks/", self.base_url);
        let stocks: Vec<Value> = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(count = stocks.len(), "stocks fetched");
        Ok(stocks)
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_market_state(&self) -> Result<MarketState, TransportError> {
        let url = format!("{}/market/", self.base_url);
        let state: MarketState = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(state)
    }

    /// One poll round. Returns false once the receiver is gone.
    async fn poll_once(&self, tx: &Sender<TransportMessage>) -> bool {
        match self.fetch_stocks().await {
            Ok(stocks) => {
                let batch = decode_batch(stocks);
                if tx.send(TransportMessage::Snapshots(batch)).await.is_err() {
                    return false;
                }
            }
            Err(e) => warn!(error = %e, "stock poll failed; holding last known state"),
        }

        match self.fetch_market_state().await {
            Ok(state) => {
                if tx.send(TransportMessage::MarketState(state)).await.is_err() {
                    return false;
                }
            }
            Err(e) => warn!(error = %e, "market state poll failed"),
        }

        true
    }
}

#[async_trait]
impl Feed for HttpPoller {
    #[instrument(skip(self, tx), fields(base_url = %self.base_url))]
    async fn run(&self, tx: Sender<TransportMessage>) -> Result<(), TransportError> {
        let mut ticker = interval(self.poll_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            every_ms = self.poll_every.as_millis() as u64,
            "http poller started"
        );

        loop {
            ticker.tick().await;

            if tx.is_closed() || !self.poll_once(&tx).await {
                info!("engine gone; http poller stopping");
                return Ok(());
            }
        }
    }
}

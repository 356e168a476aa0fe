use tracing::{debug, warn};

use super::{Detection, DetectionMode, DetectorConfig, EventSource, screen_batch};
use crate::event::Event;
use crate::index::SnapshotIndex;
use crate::types::{MarketState, StockSnapshot};

/// Event source for transports that classify events themselves.
///
/// Snapshots still refresh the index so the host keeps an up-to-date view
/// of every ticker, but no rule is evaluated locally.
pub struct PushedEvents {
    cfg: DetectorConfig,
    index: SnapshotIndex,
}

impl PushedEvents {
    pub fn new(cfg: DetectorConfig) -> Self {
        Self {
            cfg,
            index: SnapshotIndex::new(),
        }
    }

    pub fn index(&self) -> &SnapshotIndex {
        &self.index
    }
}

impl EventSource for PushedEvents {
    fn mode(&self) -> DetectionMode {
        DetectionMode::Pushed
    }

    fn on_snapshots(&mut self, batch: &[StockSnapshot]) -> Detection {
        let (valid, errors) = screen_batch(batch);

        for e in &errors {
            warn!(error = %e, ticker = e.ticker().unwrap_or("?"), "skipping malformed snapshot");
        }

        for snapshot in valid {
            self.index.observe(snapshot, self.cfg.crash_threshold_pct);
        }

        Detection {
            events: Vec::new(),
            errors,
        }
    }

    fn on_market_state(&mut self, state: MarketState) -> Vec<Event> {
        debug!(?state, "pushed detection active; market state is informational");
        Vec::new()
    }

    fn on_pushed(&mut self, event: Event) -> Option<Event> {
        Some(event)
    }
}

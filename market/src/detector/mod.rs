//! Turns snapshot batches and day-boundary signals into event candidates.
//!
//! Detection is pluggable: [`Detector`] computes events locally from raw
//! snapshots, [`PushedEvents`] accepts events the transport already
//! classified. Both feed the same dispatcher.

mod market_day;
mod pushed;
mod rules;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub use market_day::MarketClock;
pub use pushed::PushedEvents;
pub use rules::Detector;

use crate::error::DetectionError;
use crate::event::Event;
use crate::types::{MarketState, StockSnapshot};

/// Crash threshold used when none is configured (percent).
pub const DEFAULT_CRASH_THRESHOLD_PCT: f64 = -10.0;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// A ticker crashes when its percent change drops to or below this value.
    pub crash_threshold_pct: f64,
    /// Copied into market-day event metadata.
    pub snapshots_per_day: Option<u32>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            crash_threshold_pct: DEFAULT_CRASH_THRESHOLD_PCT,
            snapshots_per_day: Some(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMode {
    /// Diff raw snapshots locally.
    #[default]
    Local,
    /// Trust pre-classified events from the transport.
    Pushed,
}

impl FromStr for DetectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(DetectionMode::Local),
            "pushed" | "push" | "remote" => Ok(DetectionMode::Pushed),
            other => Err(format!("unknown detection mode `{other}`")),
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMode::Local => f.write_str("local"),
            DetectionMode::Pushed => f.write_str("pushed"),
        }
    }
}

/// Outcome of one batch: candidates in rule order plus per-ticker failures.
#[derive(Debug, Default)]
pub struct Detection {
    pub events: Vec<Event>,
    pub errors: Vec<DetectionError>,
}

/// Source of event candidates for the dispatcher.
///
/// Batches are handed over strictly one at a time.
pub trait EventSource: Send {
    fn mode(&self) -> DetectionMode;

    /// Processes one complete board.
    fn on_snapshots(&mut self, batch: &[StockSnapshot]) -> Detection;

    /// Processes a partial update of individual stocks.
    fn on_update(&mut self, batch: &[StockSnapshot]) -> Detection {
        self.on_snapshots(batch)
    }

    /// Processes one day-boundary signal.
    fn on_market_state(&mut self, state: MarketState) -> Vec<Event>;

    /// Offers an event classified by the transport. Returns it when this
    /// source accepts pushed events.
    fn on_pushed(&mut self, event: Event) -> Option<Event>;
}

/// Builds the event source for `mode`.
pub fn source_for(mode: DetectionMode, cfg: DetectorConfig) -> Box<dyn EventSource> {
    match mode {
        DetectionMode::Local => Box::new(Detector::new(cfg)),
        DetectionMode::Pushed => Box::new(PushedEvents::new(cfg)),
    }
}

/// Splits a batch into snapshots that may be processed and per-ticker
/// errors. Duplicate tickers after the first occurrence are rejected so that
/// each ticker's state changes at most once per batch.
pub(crate) fn screen_batch(batch: &[StockSnapshot]) -> (Vec<&StockSnapshot>, Vec<DetectionError>) {
    let mut valid: Vec<&StockSnapshot> = Vec::with_capacity(batch.len());
    let mut seen: HashSet<&str> = HashSet::with_capacity(batch.len());
    let mut errors = Vec::new();

    for snapshot in batch {
        if let Err(e) = snapshot.validate() {
            errors.push(e);
            continue;
        }

        if !seen.insert(snapshot.ticker.as_str()) {
            errors.push(DetectionError::Malformed {
                ticker: snapshot.ticker.clone(),
                reason: "duplicate ticker in batch".into(),
            });
            continue;
        }

        valid.push(snapshot);
    }

    (valid, errors)
}

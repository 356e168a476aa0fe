use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Rank of a snapshot whose leaderboard position is unknown. Never a leader.
pub const UNRANKED: u32 = 0;

/// One periodic observation of a listed stock. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub ticker: String,
    pub title: String,
    pub price: f64,
    /// Percent change against the stock's reference price (e.g. `-12.5`).
    pub percent_change: f64,
    /// 1-based leaderboard position, or [`UNRANKED`] when the snapshot came
    /// without one (partial updates, stocks inside pushed events).
    pub rank: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl StockSnapshot {
    /// Rejects snapshots the detector cannot reason about.
    ///
    /// A failure here only ever affects the snapshot's own ticker.
    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.ticker.trim().is_empty() {
            return Err(DetectionError::MissingTicker);
        }

        if !self.price.is_finite() || self.price < 0.0 {
            return Err(DetectionError::InvalidPrice {
                ticker: self.ticker.clone(),
                price: self.price,
            });
        }

        if !self.percent_change.is_finite() {
            return Err(DetectionError::InvalidPercentChange {
                ticker: self.ticker.clone(),
                percent_change: self.percent_change,
            });
        }

        Ok(())
    }

    pub fn is_leader(&self) -> bool {
        self.rank == 1
    }
}

/// Day-boundary signal published by the exchange simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarketState {
    pub is_open: bool,
    #[serde(default)]
    pub snapshot_count: u32,
    /// Number of completed market days.
    #[serde(default)]
    pub market_day_count: u32,
}

impl MarketState {
    /// State assumed before the first signal arrives.
    pub fn closed() -> Self {
        Self::default()
    }
}

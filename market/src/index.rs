use std::collections::{HashMap, HashSet};

use crate::types::StockSnapshot;

/// Per-ticker memory kept between batches.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntityState {
    pub last_snapshot: StockSnapshot,
    /// Highest price ever observed. Never decreases.
    pub historical_max_price: f64,
    /// True while the ticker sits at or below the crash threshold.
    pub was_in_crash_state: bool,
}

/// Last-seen state per ticker. Pure data; the detector is its only writer.
///
/// Entries are created on first sighting and never removed: tickers that
/// stop appearing simply stop being referenced. `listed` holds the tickers of
/// the latest complete board.
#[derive(Debug, Default, Clone)]
pub struct SnapshotIndex {
    inner: HashMap<String, TrackedEntityState>,
    listed: HashSet<String>,
}

impl SnapshotIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ticker: &str) -> Option<&TrackedEntityState> {
        self.inner.get(ticker)
    }

    pub fn upsert(&mut self, state: TrackedEntityState) {
        self.inner
            .insert(state.last_snapshot.ticker.clone(), state);
    }

    /// Records `snapshot` as the ticker's latest observation and returns the
    /// state it replaced (`None` on first sighting).
    ///
    /// The max price only ratchets upwards; the crash flag mirrors whether
    /// this snapshot sits at or below `crash_threshold_pct`.
    pub fn observe(
        &mut self,
        snapshot: &StockSnapshot,
        crash_threshold_pct: f64,
    ) -> Option<TrackedEntityState> {
        let in_crash = snapshot.percent_change <= crash_threshold_pct;

        let next = match self.inner.get(&snapshot.ticker) {
            Some(prev) => TrackedEntityState {
                last_snapshot: snapshot.clone(),
                historical_max_price: prev.historical_max_price.max(snapshot.price),
                was_in_crash_state: in_crash,
            },
            None => TrackedEntityState {
                last_snapshot: snapshot.clone(),
                historical_max_price: snapshot.price,
                was_in_crash_state: in_crash,
            },
        };

        self.inner.insert(snapshot.ticker.clone(), next)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Replaces the set of tickers on the current board.
    pub fn set_listed<'a>(&mut self, tickers: impl IntoIterator<Item = &'a str>) {
        self.listed = tickers.into_iter().map(str::to_owned).collect();
    }

    pub fn is_listed(&self, ticker: &str) -> bool {
        self.listed.contains(ticker)
    }

    /// Latest snapshot with the highest percent change among the tickers on
    /// the current board. Before any board has been seen every known ticker
    /// is a candidate.
    pub fn top_mover(&self) -> Option<&StockSnapshot> {
        self.inner
            .iter()
            .filter(|(ticker, _)| self.listed.is_empty() || self.listed.contains(*ticker))
            .map(|(_, s)| &s.last_snapshot)
            .max_by(|a, b| {
                a.percent_change
                    .total_cmp(&b.percent_change)
                    .then_with(|| b.ticker.cmp(&a.ticker))
            })
    }
}

/// Which ticker currently holds rank 1.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LeaderState {
    pub current_leader_ticker: Option<String>,
}

use tracing::{debug, info};

use crate::event::EventPayload;
use crate::types::{MarketState, StockSnapshot};

/// Derives MarketOpen / MarketClose from successive day-boundary signals.
///
/// Before the first signal the market is assumed closed at day 0. Each day
/// is announced open at most once and closed at most once, so a transport
/// that repeats a signal never re-fires the event.
#[derive(Debug, Default, Clone)]
pub struct MarketClock {
    last: Option<MarketState>,
    announced_open: Option<u32>,
    announced_close: Option<u32>,
}

impl MarketClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_state(&self) -> Option<MarketState> {
        self.last
    }

    /// Feeds one signal and returns the boundary events it implies.
    pub fn on_signal(
        &mut self,
        next: MarketState,
        leader: Option<StockSnapshot>,
        top_mover: Option<StockSnapshot>,
        snapshots_per_day: Option<u32>,
    ) -> Vec<EventPayload> {
        let prev = self.last.unwrap_or_else(MarketState::closed);
        let mut out = Vec::new();

        if prev.is_open && !next.is_open {
            let day = next.market_day_count;
            if self.announced_close != Some(day) {
                self.announced_close = Some(day);
                info!(
                    market_day = day,
                    top_mover = top_mover.as_ref().map(|s| s.ticker.as_str()).unwrap_or("none"),
                    "market closed"
                );
                out.push(EventPayload::MarketClose {
                    leader: leader.clone(),
                    top_mover,
                    market_day: day,
                    snapshots_per_day,
                });
            } else {
                debug!(market_day = day, "close already announced");
            }
        }

        let day_advanced = next.market_day_count > prev.market_day_count && next.is_open;
        let reopened = !prev.is_open && next.is_open;

        if day_advanced || reopened {
            let day = next.market_day_count + 1;
            if self.announced_open != Some(day) {
                self.announced_open = Some(day);
                info!(market_day = day, "market opened");
                out.push(EventPayload::MarketOpen {
                    leader,
                    market_day: day,
                    snapshots_per_day,
                });
            } else {
                debug!(market_day = day, "open already announced");
            }
        }

        self.last = Some(next);
        out
    }
}

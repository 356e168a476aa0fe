use tracing::{debug, info, instrument, warn};

use super::{Detection, DetectionMode, DetectorConfig, EventSource, MarketClock, screen_batch};
use crate::event::{Event, EventPayload};
use crate::index::{LeaderState, SnapshotIndex};
use crate::types::{MarketState, StockSnapshot};

/// Client-side detector. Every rule is edge-triggered: it fires on the tick
/// its condition becomes true, never while the condition merely persists.
///
/// Rule order per batch is fixed:
///   1. NewLeader (once per batch)
///   2. per ticker, in batch order: AllTimeHigh, then Crash
pub struct Detector {
    cfg: DetectorConfig,
    index: SnapshotIndex,
    leader: LeaderState,
    clock: MarketClock,
}

impl Detector {
    pub fn new(cfg: DetectorConfig) -> Self {
        Self {
            cfg,
            index: SnapshotIndex::new(),
            leader: LeaderState::default(),
            clock: MarketClock::new(),
        }
    }

    pub fn index(&self) -> &SnapshotIndex {
        &self.index
    }

    pub fn leader(&self) -> &LeaderState {
        &self.leader
    }

    /// Latest snapshot of the current rank-1 ticker.
    pub fn leader_snapshot(&self) -> Option<&StockSnapshot> {
        let ticker = self.leader.current_leader_ticker.as_deref()?;
        self.index.get(ticker).map(|s| &s.last_snapshot)
    }

    /// Runs every rule over one complete board and updates the index. The
    /// board's tickers become the candidates for the day's top mover.
    #[instrument(skip(self, batch), fields(batch_size = batch.len()), level = "debug")]
    pub fn detect(&mut self, batch: &[StockSnapshot]) -> Detection {
        let out = self.run_rules(batch);
        self.index.set_listed(batch.iter().map(|s| s.ticker.as_str()));
        out
    }

    /// Runs every rule over a partial update. Unranked snapshots never take
    /// part in the leader rule.
    #[instrument(skip(self, batch), fields(batch_size = batch.len()), level = "debug")]
    pub fn detect_update(&mut self, batch: &[StockSnapshot]) -> Detection {
        self.run_rules(batch)
    }

    fn run_rules(&mut self, batch: &[StockSnapshot]) -> Detection {
        let (valid, errors) = screen_batch(batch);

        for e in &errors {
            warn!(error = %e, ticker = e.ticker().unwrap_or("?"), "skipping malformed snapshot");
        }

        let mut events = Vec::new();

        if let Some(leader) = valid.iter().copied().find(|s| s.is_leader()) {
            self.check_leader(leader, &mut events);
        } else {
            debug!("batch has no rank-1 snapshot; leader unchanged");
        }

        for snapshot in valid {
            self.check_ticker(snapshot, &mut events);
        }

        Detection { events, errors }
    }

    /// Repackages a day-boundary signal. The leading stock at the time of
    /// the signal becomes the event subject.
    #[instrument(skip(self), level = "debug")]
    pub fn market_state(&mut self, state: MarketState) -> Vec<Event> {
        let leader = self.leader_snapshot().cloned();
        let top_mover = self.index.top_mover().cloned();

        self.clock
            .on_signal(state, leader, top_mover, self.cfg.snapshots_per_day)
            .into_iter()
            .map(Event::new)
            .collect()
    }

    fn check_leader(&mut self, leader: &StockSnapshot, events: &mut Vec<Event>) {
        let previous = self
            .leader
            .current_leader_ticker
            .replace(leader.ticker.clone());

        match previous {
            Some(prev) if prev != leader.ticker => {
                info!(
                    ticker = %leader.ticker,
                    previous = %prev,
                    "new leader took the lead"
                );
                events.push(Event::new(EventPayload::NewLeader {
                    leader: leader.clone(),
                    previous_leader_ticker: prev,
                }));
            }
            Some(_) => {}
            None => debug!(ticker = %leader.ticker, "first leader observed"),
        }
    }

    fn check_ticker(&mut self, snapshot: &StockSnapshot, events: &mut Vec<Event>) {
        let threshold = self.cfg.crash_threshold_pct;

        let Some(prev) = self.index.observe(snapshot, threshold) else {
            debug!(ticker = %snapshot.ticker, price = snapshot.price, "first sighting");
            return;
        };

        if snapshot.price > prev.historical_max_price {
            info!(
                ticker = %snapshot.ticker,
                previous_high = prev.historical_max_price,
                new_high = snapshot.price,
                "all-time high"
            );
            events.push(Event::new(EventPayload::AllTimeHigh {
                stock: snapshot.clone(),
                previous_high: prev.historical_max_price,
                new_high: snapshot.price,
            }));
        }

        if snapshot.percent_change <= threshold && !prev.was_in_crash_state {
            info!(
                ticker = %snapshot.ticker,
                crash_percent = snapshot.percent_change,
                "crash threshold crossed"
            );
            events.push(Event::new(EventPayload::Crash {
                stock: snapshot.clone(),
                crash_percent: snapshot.percent_change,
                previous_price: Some(prev.last_snapshot.price),
            }));
        }
    }
}

impl EventSource for Detector {
    fn mode(&self) -> DetectionMode {
        DetectionMode::Local
    }

    fn on_snapshots(&mut self, batch: &[StockSnapshot]) -> Detection {
        self.detect(batch)
    }

    fn on_update(&mut self, batch: &[StockSnapshot]) -> Detection {
        self.detect_update(batch)
    }

    fn on_market_state(&mut self, state: MarketState) -> Vec<Event> {
        self.market_state(state)
    }

    fn on_pushed(&mut self, event: Event) -> Option<Event> {
        debug!(
            event_id = %event.id,
            event_type = %event.event_type(),
            "local detection active; ignoring pre-classified event"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectionError;
    use crate::event::EventType;
    use crate::types::UNRANKED;
    use tracing_test::traced_test;

    fn snap(ticker: &str, price: f64, pct: f64, rank: u32) -> StockSnapshot {
        StockSnapshot {
            ticker: ticker.into(),
            title: format!("{ticker} Corp"),
            price,
            percent_change: pct,
            rank,
            image: None,
        }
    }

    fn types(d: &Detection) -> Vec<EventType> {
        d.events.iter().map(|e| e.event_type()).collect()
    }

    #[test]
    fn first_leader_does_not_fire() {
        let mut det = Detector::new(DetectorConfig::default());
        let out = det.detect(&[snap("AAA", 10.0, 0.0, 1)]);
        assert!(out.events.is_empty());
        assert_eq!(det.leader().current_leader_ticker.as_deref(), Some("AAA"));
    }

    #[test]
    fn leader_change_fires_once_with_previous_ticker() {
        let mut det = Detector::new(DetectorConfig::default());
        det.detect(&[snap("AAA", 10.0, 0.0, 1), snap("BBB", 9.0, 0.0, 2)]);

        let out = det.detect(&[snap("AAA", 9.0, 0.0, 2), snap("BBB", 9.5, 0.0, 1)]);
        assert_eq!(types(&out), vec![EventType::NewLeader]);
        match &out.events[0].payload {
            EventPayload::NewLeader {
                leader,
                previous_leader_ticker,
            } => {
                assert_eq!(leader.ticker, "BBB");
                assert_eq!(previous_leader_ticker, "AAA");
            }
            other => panic!("unexpected payload {other:?}"),
        }

        // Same leader again: nothing.
        let out = det.detect(&[snap("AAA", 9.0, 0.0, 2), snap("BBB", 9.4, 0.0, 1)]);
        assert!(out.events.is_empty());
    }

    #[test]
    fn all_time_high_compares_against_stored_max() {
        let mut det = Detector::new(DetectorConfig::default());
        let prices = [100.0, 105.0, 103.0, 110.0];
        let fired: Vec<bool> = prices
            .iter()
            .map(|p| {
                let out = det.detect(&[snap("AAA", *p, 0.0, 1)]);
                out.events
                    .iter()
                    .any(|e| e.event_type() == EventType::AllTimeHigh)
            })
            .collect();

        assert_eq!(fired, vec![false, true, false, true]);
        assert_eq!(det.index().get("AAA").unwrap().historical_max_price, 110.0);
    }

    #[test]
    fn all_time_high_metadata_carries_previous_max() {
        let mut det = Detector::new(DetectorConfig::default());
        for p in [100.0, 105.0, 103.0] {
            det.detect(&[snap("AAA", p, 0.0, 1)]);
        }
        let out = det.detect(&[snap("AAA", 110.0, 0.0, 1)]);
        match &out.events[0].payload {
            EventPayload::AllTimeHigh {
                previous_high,
                new_high,
                ..
            } => {
                assert_eq!(*previous_high, 105.0);
                assert_eq!(*new_high, 110.0);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn crash_fires_once_per_downward_crossing() {
        let mut det = Detector::new(DetectorConfig::default());
        let pcts = [-5.0, -12.0, -15.0, -8.0, -20.0];
        let fired: Vec<usize> = pcts
            .iter()
            .enumerate()
            .filter_map(|(i, pct)| {
                let out = det.detect(&[snap("AAA", 50.0, *pct, 1)]);
                out.events
                    .iter()
                    .any(|e| e.event_type() == EventType::Crash)
                    .then_some(i)
            })
            .collect();

        assert_eq!(fired, vec![1, 4]);
    }

    #[test]
    fn crash_exactly_at_threshold_counts() {
        let mut det = Detector::new(DetectorConfig::default());
        det.detect(&[snap("AAA", 50.0, 0.0, 1)]);
        let out = det.detect(&[snap("AAA", 45.0, -10.0, 1)]);
        match &out.events[0].payload {
            EventPayload::Crash {
                crash_percent,
                previous_price,
                ..
            } => {
                assert_eq!(*crash_percent, -10.0);
                assert_eq!(*previous_price, Some(50.0));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn first_sighting_below_threshold_is_seeded_silently() {
        let mut det = Detector::new(DetectorConfig::default());
        let out = det.detect(&[snap("AAA", 50.0, -15.0, 1)]);
        assert!(out.events.is_empty());

        let out = det.detect(&[snap("AAA", 49.0, -16.0, 1)]);
        assert!(out.events.is_empty());
    }

    #[test]
    fn rule_order_is_leader_then_per_ticker_ath_then_crash() {
        let mut det = Detector::new(DetectorConfig::default());
        det.detect(&[snap("AAA", 10.0, 0.0, 1), snap("BBB", 9.0, 0.0, 2)]);

        // BBB takes the lead at a new high; AAA crashes.
        let out = det.detect(&[snap("AAA", 8.0, -11.0, 2), snap("BBB", 12.0, 5.0, 1)]);
        assert_eq!(
            types(&out),
            vec![EventType::NewLeader, EventType::Crash, EventType::AllTimeHigh]
        );
    }

    #[test]
    fn malformed_ticker_does_not_abort_batch() {
        let mut det = Detector::new(DetectorConfig::default());
        det.detect(&[snap("AAA", 10.0, 0.0, 1), snap("BBB", 10.0, 0.0, 2)]);

        let out = det.detect(&[snap("AAA", f64::NAN, 0.0, 1), snap("BBB", 11.0, 0.0, 2)]);
        assert_eq!(types(&out), vec![EventType::AllTimeHigh]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].ticker(), Some("AAA"));

        // AAA state untouched by the bad tick.
        assert_eq!(det.index().get("AAA").unwrap().last_snapshot.price, 10.0);
    }

    #[test]
    fn duplicate_ticker_in_batch_is_rejected_after_first() {
        let mut det = Detector::new(DetectorConfig::default());
        det.detect(&[snap("AAA", 10.0, 0.0, 1)]);

        let out = det.detect(&[snap("AAA", 11.0, 0.0, 1), snap("AAA", 12.0, 0.0, 1)]);
        assert_eq!(out.events.len(), 1);
        assert!(matches!(out.errors[0], DetectionError::Malformed { .. }));
        assert_eq!(det.index().get("AAA").unwrap().historical_max_price, 11.0);
    }

    #[test]
    fn pushed_events_are_ignored_in_local_mode() {
        let mut det = Detector::new(DetectorConfig::default());
        let e = Event::new(EventPayload::MarketOpen {
            leader: None,
            market_day: 1,
            snapshots_per_day: None,
        });
        assert!(det.on_pushed(e).is_none());
    }

    #[test]
    fn market_state_uses_current_leader_as_subject() {
        let mut det = Detector::new(DetectorConfig::default());
        det.detect(&[snap("AAA", 10.0, 3.0, 1), snap("BBB", 9.0, 7.0, 2)]);

        let events = det.market_state(MarketState {
            is_open: true,
            snapshot_count: 0,
            market_day_count: 0,
        });
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), EventType::MarketOpen);
        assert_eq!(events[0].subject_ticker(), Some("AAA"));

        let events = det.market_state(MarketState {
            is_open: false,
            snapshot_count: 30,
            market_day_count: 1,
        });
        match &events[0].payload {
            EventPayload::MarketClose {
                leader,
                top_mover,
                market_day,
                snapshots_per_day,
            } => {
                assert_eq!(leader.as_ref().unwrap().ticker, "AAA");
                assert_eq!(top_mover.as_ref().unwrap().ticker, "BBB");
                assert_eq!(*market_day, 1);
                assert_eq!(*snapshots_per_day, Some(30));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    #[traced_test]
    fn malformed_snapshot_is_logged_and_skipped() {
        let mut det = Detector::new(DetectorConfig::default());
        let out = det.detect(&[snap("AAA", f64::NAN, 0.0, 1), snap("BBB", 5.0, 0.0, 2)]);

        assert_eq!(out.errors.len(), 1);
        assert!(det.index().get("BBB").is_some());
        assert!(logs_contain("skipping malformed snapshot"));
    }

    #[test]
    fn unranked_update_feeds_price_rules_but_not_leader() {
        let mut det = Detector::new(DetectorConfig::default());
        det.detect(&[snap("AAA", 200.0, 0.0, 1), snap("BBB", 50.0, 0.0, 2)]);

        let out = det.detect_update(&[snap("BBB", 51.0, -15.0, UNRANKED)]);
        assert_eq!(types(&out), vec![EventType::AllTimeHigh, EventType::Crash]);
        assert_eq!(det.leader().current_leader_ticker.as_deref(), Some("AAA"));

        let out = det.detect(&[snap("AAA", 200.0, 0.0, 1), snap("BBB", 51.0, -15.0, 2)]);
        assert!(out.events.is_empty());
    }

    #[test]
    fn partial_update_keeps_board_listing() {
        let mut det = Detector::new(DetectorConfig::default());
        det.detect(&[snap("AAA", 10.0, 1.0, 1), snap("BBB", 9.0, 2.0, 2)]);
        det.detect_update(&[snap("NEW", 5.0, 30.0, UNRANKED)]);

        assert!(det.index().is_listed("BBB"));
        assert!(!det.index().is_listed("NEW"));
        assert_eq!(det.index().top_mover().unwrap().ticker, "BBB");
    }

    #[test]
    fn delisted_ticker_is_never_top_mover() {
        let mut det = Detector::new(DetectorConfig::default());
        det.detect(&[snap("AAA", 10.0, 1.0, 1), snap("OLD", 9.0, 40.0, 2)]);
        det.detect(&[snap("AAA", 10.0, 1.0, 1), snap("BBB", 9.0, 2.0, 2)]);

        det.market_state(MarketState {
            is_open: true,
            snapshot_count: 0,
            market_day_count: 0,
        });
        let events = det.market_state(MarketState {
            is_open: false,
            snapshot_count: 30,
            market_day_count: 1,
        });
        match &events[0].payload {
            EventPayload::MarketClose { top_mover, .. } => {
                assert_eq!(top_mover.as_ref().unwrap().ticker, "BBB");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}

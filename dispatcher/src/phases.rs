//! Per-event-type phase tables.

use std::collections::HashMap;
use std::time::Duration;

use market::event::EventType;

/// Name of the phase that absorbs any difference when a table is fitted to
/// a configured total.
pub const HOLD: &str = "hold";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSpec {
    pub name: &'static str,
    pub duration: Duration,
}

impl PhaseSpec {
    pub const fn ms(name: &'static str, ms: u64) -> Self {
        Self {
            name,
            duration: Duration::from_millis(ms),
        }
    }
}

/// Ordered phases of one presentation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhaseTable {
    phases: Vec<PhaseSpec>,
}

impl PhaseTable {
    pub fn new(phases: Vec<PhaseSpec>) -> Self {
        Self { phases }
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PhaseSpec> {
        self.phases.get(index)
    }

    pub fn total(&self) -> Duration {
        self.phases.iter().map(|p| p.duration).sum()
    }

    /// Stretches or shrinks the `hold` phase so the table sums to `total`.
    ///
    /// The other phases keep their lengths. When they alone exceed `total`
    /// the hold phase collapses to zero. Tables without a hold phase are
    /// returned unchanged.
    pub fn fit_to(mut self, total: Duration) -> Self {
        let Some(hold_at) = self.phases.iter().position(|p| p.name == HOLD) else {
            return self;
        };

        let fixed: Duration = self
            .phases
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != hold_at)
            .map(|(_, p)| p.duration)
            .sum();

        self.phases[hold_at].duration = total.saturating_sub(fixed);
        self
    }

    pub fn default_for(kind: EventType) -> Self {
        let phases = match kind {
            EventType::NewLeader => vec![
                PhaseSpec::ms("intro", 1000),
                PhaseSpec::ms("reveal", 1500),
                PhaseSpec::ms(HOLD, 2500),
                PhaseSpec::ms("exit", 1000),
            ],
            EventType::AllTimeHigh => vec![
                PhaseSpec::ms("intro", 800),
                PhaseSpec::ms("burst", 1700),
                PhaseSpec::ms(HOLD, 1500),
                PhaseSpec::ms("exit", 1000),
            ],
            EventType::Crash => vec![
                PhaseSpec::ms("shake", 1000),
                PhaseSpec::ms("plunge", 1500),
                PhaseSpec::ms(HOLD, 1500),
                PhaseSpec::ms("exit", 1000),
            ],
            EventType::MarketOpen => vec![
                PhaseSpec::ms("bell", 1000),
                PhaseSpec::ms(HOLD, 2000),
                PhaseSpec::ms("exit", 1000),
            ],
            EventType::MarketClose => vec![
                PhaseSpec::ms("bell", 1000),
                PhaseSpec::ms(HOLD, 3000),
                PhaseSpec::ms("exit", 1000),
            ],
        };
        Self::new(phases)
    }
}

/// One table per event type.
#[derive(Debug, Clone)]
pub struct PhaseTables {
    tables: HashMap<EventType, PhaseTable>,
}

impl PhaseTables {
    /// Default tables, each fitted to the total returned by `total_for`.
    pub fn with_totals(total_for: impl Fn(EventType) -> Duration) -> Self {
        let tables = EventType::ALL
            .into_iter()
            .map(|kind| (kind, PhaseTable::default_for(kind).fit_to(total_for(kind))))
            .collect();
        Self { tables }
    }

    pub fn set(&mut self, kind: EventType, table: PhaseTable) {
        self.tables.insert(kind, table);
    }

    pub fn table_for(&self, kind: EventType) -> PhaseTable {
        self.tables
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| PhaseTable::default_for(kind))
    }
}

impl Default for PhaseTables {
    fn default() -> Self {
        Self::with_totals(|kind| PhaseTable::default_for(kind).total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_totals_per_type() {
        let expect = [
            (EventType::NewLeader, 6000),
            (EventType::AllTimeHigh, 5000),
            (EventType::Crash, 5000),
            (EventType::MarketOpen, 4000),
            (EventType::MarketClose, 5000),
        ];
        for (kind, ms) in expect {
            assert_eq!(
                PhaseTable::default_for(kind).total(),
                Duration::from_millis(ms),
                "{kind}"
            );
        }
    }

    #[test]
    fn fit_stretches_hold_only() {
        let t = PhaseTable::default_for(EventType::NewLeader).fit_to(Duration::from_millis(8000));

        assert_eq!(t.total(), Duration::from_millis(8000));
        assert_eq!(t.get(0).unwrap().duration, Duration::from_millis(1000));
        assert_eq!(t.get(2).unwrap().name, HOLD);
        assert_eq!(t.get(2).unwrap().duration, Duration::from_millis(4500));
    }

    #[test]
    fn fit_below_fixed_collapses_hold() {
        let t = PhaseTable::default_for(EventType::MarketOpen).fit_to(Duration::from_millis(500));

        assert_eq!(t.get(1).unwrap().duration, Duration::ZERO);
        assert_eq!(t.total(), Duration::from_millis(2000));
    }

    #[test]
    fn fit_without_hold_is_noop() {
        let t = PhaseTable::new(vec![PhaseSpec::ms("only", 300)]);
        assert_eq!(t.clone().fit_to(Duration::from_secs(9)), t);
    }

    #[test]
    fn tables_use_configured_totals() {
        let tables = PhaseTables::with_totals(|kind| match kind {
            EventType::Crash => Duration::from_millis(7000),
            other => PhaseTable::default_for(other).total(),
        });

        assert_eq!(
            tables.table_for(EventType::Crash).total(),
            Duration::from_millis(7000)
        );
        assert_eq!(
            tables.table_for(EventType::NewLeader).total(),
            Duration::from_millis(6000)
        );
    }
}

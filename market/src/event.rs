//! Notable market events and their per-type payloads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::StockSnapshot;

pub type EventId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NewLeader,
    AllTimeHigh,
    Crash,
    MarketOpen,
    MarketClose,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::NewLeader,
        EventType::AllTimeHigh,
        EventType::Crash,
        EventType::MarketOpen,
        EventType::MarketClose,
    ];

    /// Name used on the transport.
    pub fn wire_name(&self) -> &'static str {
        match self {
            EventType::NewLeader => "new_leader",
            EventType::AllTimeHigh => "all_time_high",
            EventType::Crash => "big_crash",
            EventType::MarketOpen => "market_open",
            EventType::MarketClose => "market_close",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Closed, per-type event body. The variant is the event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    NewLeader {
        leader: StockSnapshot,
        previous_leader_ticker: String,
    },
    AllTimeHigh {
        stock: StockSnapshot,
        previous_high: f64,
        new_high: f64,
    },
    Crash {
        stock: StockSnapshot,
        crash_percent: f64,
        /// Price at the previous tick; unknown for pushed events.
        previous_price: Option<f64>,
    },
    MarketOpen {
        leader: Option<StockSnapshot>,
        market_day: u32,
        snapshots_per_day: Option<u32>,
    },
    MarketClose {
        leader: Option<StockSnapshot>,
        /// Best percent change of the day, when known.
        top_mover: Option<StockSnapshot>,
        market_day: u32,
        snapshots_per_day: Option<u32>,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::NewLeader { .. } => EventType::NewLeader,
            EventPayload::AllTimeHigh { .. } => EventType::AllTimeHigh,
            EventPayload::Crash { .. } => EventType::Crash,
            EventPayload::MarketOpen { .. } => EventType::MarketOpen,
            EventPayload::MarketClose { .. } => EventType::MarketClose,
        }
    }

    /// The stock the presentation is about.
    pub fn subject(&self) -> Option<&StockSnapshot> {
        match self {
            EventPayload::NewLeader { leader, .. } => Some(leader),
            EventPayload::AllTimeHigh { stock, .. } | EventPayload::Crash { stock, .. } => {
                Some(stock)
            }
            EventPayload::MarketOpen { leader, .. } => leader.as_ref(),
            EventPayload::MarketClose {
                leader, top_mover, ..
            } => leader.as_ref().or(top_mover.as_ref()),
        }
    }
}

/// A notable occurrence queued for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            payload,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn subject(&self) -> Option<&StockSnapshot> {
        self.payload.subject()
    }

    pub fn subject_ticker(&self) -> Option<&str> {
        self.subject().map(|s| s.ticker.as_str())
    }
}

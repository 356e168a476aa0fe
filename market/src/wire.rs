//! Transport message shapes and their normalisation into the internal model.
//!
//! Field names follow the transport's casing; nothing outside this module
//! sees them.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{DetectionError, WireError};
use crate::event::{Event, EventPayload};
use crate::types::{MarketState, StockSnapshot, UNRANKED};

/// A normalised message from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportMessage {
    /// A batch of snapshots, plus the stocks that failed to decode.
    Snapshots(SnapshotBatch),
    /// Day-boundary signal.
    MarketState(MarketState),
    /// An event classified upstream.
    Event(Event),
    /// A frame that failed to decode. Forwarded so the host can count it.
    Rejected { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotBatch {
    pub snapshots: Vec<StockSnapshot>,
    pub rejected: Vec<DetectionError>,
    /// True when the batch lists the whole board; false for a partial
    /// update of individual stocks.
    pub complete: bool,
}

impl SnapshotBatch {
    /// A complete board.
    pub fn new(snapshots: Vec<StockSnapshot>) -> Self {
        Self {
            snapshots,
            rejected: Vec::new(),
            complete: true,
        }
    }

    /// A partial update touching only the listed stocks.
    pub fn partial(snapshots: Vec<StockSnapshot>) -> Self {
        Self {
            complete: false,
            ..Self::new(snapshots)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawMessage {
    StocksUpdate {
        stocks: Vec<Value>,
    },
    StockUpdate {
        stock: Value,
    },
    MarketState {
        is_open: bool,
        #[serde(default)]
        snapshot_count: u32,
        #[serde(default)]
        market_day_count: u32,
    },
    Event(WireEvent),
    #[serde(other)]
    Unknown,
}

/// Pre-classified event as sent by the transport. Also the shape accepted
/// for manual triggers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireEvent {
    pub event_type: String,
    #[serde(default)]
    pub stock: Option<Value>,
    #[serde(default)]
    pub leader: Option<Value>,
    #[serde(default)]
    pub metadata: WireMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireMetadata {
    pub previous_leader_ticker: Option<String>,
    pub crash_percent: Option<f64>,
    pub previous_price: Option<f64>,
    pub previous_high: Option<f64>,
    pub new_high: Option<f64>,
    pub market_day: Option<u32>,
    pub snapshots_per_day: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireStock {
    ticker: String,
    #[serde(default)]
    title: String,
    price: f64,
    #[serde(alias = "percentChange", alias = "percentage_change")]
    percent_change: f64,
    #[serde(default)]
    rank: Option<u32>,
    #[serde(default)]
    image: Option<String>,
}

impl WireStock {
    fn into_snapshot(self, rank: u32) -> StockSnapshot {
        StockSnapshot {
            ticker: self.ticker,
            title: self.title,
            price: self.price,
            percent_change: self.percent_change,
            rank,
            image: self.image,
        }
    }
}

/// Decodes one text frame. Returns `Ok(None)` for message types the engine
/// does not consume.
pub fn decode(text: &str) -> Result<Option<TransportMessage>, WireError> {
    let raw: RawMessage = serde_json::from_str(text)?;

    let msg = match raw {
        RawMessage::StocksUpdate { stocks } => TransportMessage::Snapshots(decode_batch(stocks)),
        RawMessage::StockUpdate { stock } => TransportMessage::Snapshots(decode_update(stock)),
        RawMessage::MarketState {
            is_open,
            snapshot_count,
            market_day_count,
        } => TransportMessage::MarketState(MarketState {
            is_open,
            snapshot_count,
            market_day_count,
        }),
        RawMessage::Event(ev) => TransportMessage::Event(Event::new(normalize_event(ev)?)),
        RawMessage::Unknown => {
            debug!("ignoring transport message of unknown type");
            return Ok(None);
        }
    };

    Ok(Some(msg))
}

/// Decodes a complete board. Every stock is decoded independently; one bad
/// entry never poisons the rest.
///
/// When any decoded stock lacks a rank, the whole board is ranked by
/// descending price (ties broken by ticker).
pub fn decode_batch(stocks: Vec<Value>) -> SnapshotBatch {
    let (decoded, rejected) = decode_stocks(stocks);

    let snapshots = if decoded.iter().all(|s| s.rank.is_some()) {
        decoded
            .into_iter()
            .map(|s| {
                let rank = s.rank.unwrap_or(UNRANKED);
                s.into_snapshot(rank)
            })
            .collect()
    } else {
        rank_by_price(decoded)
    };

    SnapshotBatch {
        snapshots,
        rejected,
        complete: true,
    }
}

/// Decodes a single-stock update. It only sees one stock, so a missing rank
/// stays [`UNRANKED`] rather than being inferred.
pub fn decode_update(stock: Value) -> SnapshotBatch {
    let (decoded, rejected) = decode_stocks(vec![stock]);

    SnapshotBatch {
        snapshots: decoded
            .into_iter()
            .map(|s| {
                let rank = s.rank.unwrap_or(UNRANKED);
                s.into_snapshot(rank)
            })
            .collect(),
        rejected,
        complete: false,
    }
}

fn decode_stocks(stocks: Vec<Value>) -> (Vec<WireStock>, Vec<DetectionError>) {
    let mut decoded = Vec::with_capacity(stocks.len());
    let mut rejected = Vec::new();

    for value in stocks {
        let ticker = value
            .get("ticker")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match serde_json::from_value::<WireStock>(value) {
            Ok(s) => decoded.push(s),
            Err(e) if ticker.is_empty() => {
                debug!(error = %e, "stock without ticker");
                rejected.push(DetectionError::MissingTicker);
            }
            Err(e) => rejected.push(DetectionError::Malformed {
                ticker,
                reason: e.to_string(),
            }),
        }
    }

    (decoded, rejected)
}

fn rank_by_price(mut stocks: Vec<WireStock>) -> Vec<StockSnapshot> {
    stocks.sort_by(|a, b| {
        b.price
            .total_cmp(&a.price)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });

    stocks
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.into_snapshot(i as u32 + 1))
        .collect()
}

/// Parses a stock carried inside an event. Unranked stocks get
/// [`UNRANKED`], except a new leader, which is rank 1 by definition.
fn event_stock(value: Value, default_rank: u32) -> Result<StockSnapshot, WireError> {
    let s: WireStock = serde_json::from_value(value)?;
    let rank = s.rank.unwrap_or(default_rank);
    Ok(s.into_snapshot(rank))
}

fn optional_stock(value: Option<Value>) -> Result<Option<StockSnapshot>, WireError> {
    value.map(|v| event_stock(v, UNRANKED)).transpose()
}

/// Maps the transport's event shape onto the closed payload union.
pub fn normalize_event(raw: WireEvent) -> Result<EventPayload, WireError> {
    let WireEvent {
        event_type,
        stock,
        leader,
        metadata: meta,
    } = raw;

    let payload = match event_type.as_str() {
        "new_leader" => {
            let value = stock.or(leader).ok_or(WireError::MissingField {
                event_type: "new_leader",
                field: "stock",
            })?;
            EventPayload::NewLeader {
                leader: event_stock(value, 1)?,
                previous_leader_ticker: meta.previous_leader_ticker.ok_or(
                    WireError::MissingField {
                        event_type: "new_leader",
                        field: "previous_leader_ticker",
                    },
                )?,
            }
        }
        "all_time_high" => {
            let stock = event_stock(
                stock.ok_or(WireError::MissingField {
                    event_type: "all_time_high",
                    field: "stock",
                })?,
                0,
            )?;
            EventPayload::AllTimeHigh {
                previous_high: meta.previous_high.ok_or(WireError::MissingField {
                    event_type: "all_time_high",
                    field: "previous_high",
                })?,
                new_high: meta.new_high.unwrap_or(stock.price),
                stock,
            }
        }
        "big_crash" => {
            let stock = event_stock(
                stock.ok_or(WireError::MissingField {
                    event_type: "big_crash",
                    field: "stock",
                })?,
                0,
            )?;
            EventPayload::Crash {
                crash_percent: meta.crash_percent.unwrap_or(stock.percent_change),
                previous_price: meta.previous_price,
                stock,
            }
        }
        "market_open" => EventPayload::MarketOpen {
            leader: optional_stock(leader.or(stock))?,
            market_day: meta.market_day.ok_or(WireError::MissingField {
                event_type: "market_open",
                field: "market_day",
            })?,
            snapshots_per_day: meta.snapshots_per_day,
        },
        "market_close" => EventPayload::MarketClose {
            leader: optional_stock(leader)?,
            top_mover: optional_stock(stock)?,
            market_day: meta.market_day.ok_or(WireError::MissingField {
                event_type: "market_close",
                field: "market_day",
            })?,
            snapshots_per_day: meta.snapshots_per_day,
        },
        _ => return Err(WireError::UnknownEventType(event_type)),
    };

    Ok(payload)
}

use market::error::{DetectionError, WireError};
use market::event::{EventPayload, EventType};
use market::types::{MarketState, UNRANKED};
use market::wire::{TransportMessage, WireEvent, decode, normalize_event};
use serde_json::json;

fn decode_ok(v: serde_json::Value) -> TransportMessage {
    decode(&v.to_string())
        .expect("decodes")
        .expect("consumed message type")
}

#[test]
fn stocks_update_keeps_good_stocks_and_reports_bad_ones() {
    let msg = decode_ok(json!({
        "type": "stocks_update",
        "stocks": [
            { "ticker": "AAA", "title": "Alpha", "price": 120.0, "percent_change": 2.0, "rank": 1 },
            { "ticker": "BBB", "title": "Beta", "price": "oops", "percent_change": 1.0, "rank": 2 },
            { "ticker": "CCC", "title": "Gamma", "price": 80, "percentChange": -3.5, "rank": 3 },
            { "title": "No ticker", "price": 1.0, "percent_change": 0.0 }
        ]
    }));

    let TransportMessage::Snapshots(batch) = msg else {
        panic!("expected a snapshot batch");
    };

    let tickers: Vec<_> = batch.snapshots.iter().map(|s| s.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["AAA", "CCC"]);
    assert_eq!(batch.snapshots[1].percent_change, -3.5);

    assert_eq!(batch.rejected.len(), 2);
    assert_eq!(batch.rejected[0].ticker(), Some("BBB"));
    assert_eq!(batch.rejected[1], DetectionError::MissingTicker);
}

#[test]
fn unranked_batch_is_ranked_by_price() {
    let msg = decode_ok(json!({
        "type": "stocks_update",
        "stocks": [
            { "ticker": "LOW", "title": "", "price": 10.0, "percentage_change": 0.0 },
            { "ticker": "TOP", "title": "", "price": 99.0, "percentage_change": 0.0 },
            { "ticker": "MID", "title": "", "price": 50.0, "percentage_change": 0.0, "rank": 7 }
        ]
    }));

    let TransportMessage::Snapshots(batch) = msg else {
        panic!("expected a snapshot batch");
    };

    let ranked: Vec<_> = batch
        .snapshots
        .iter()
        .map(|s| (s.ticker.as_str(), s.rank))
        .collect();
    assert_eq!(ranked, vec![("TOP", 1), ("MID", 2), ("LOW", 3)]);
    assert!(batch.complete);
}

#[test]
fn single_stock_update_is_a_batch_of_one() {
    let msg = decode_ok(json!({
        "type": "stock_update",
        "stock": { "ticker": "AAA", "title": "Alpha", "price": 1.0, "percent_change": 0.0, "rank": 4 }
    }));

    let TransportMessage::Snapshots(batch) = msg else {
        panic!("expected a snapshot batch");
    };
    assert_eq!(batch.snapshots.len(), 1);
    assert_eq!(batch.snapshots[0].rank, 4);
    assert!(!batch.complete);
}

#[test]
fn unranked_single_stock_update_is_not_ranked_by_price() {
    let msg = decode_ok(json!({
        "type": "stock_update",
        "stock": { "ticker": "BBB", "title": "Beta", "price": 51.0, "percent_change": 2.0 }
    }));

    let TransportMessage::Snapshots(batch) = msg else {
        panic!("expected a snapshot batch");
    };
    assert_eq!(batch.snapshots[0].rank, UNRANKED);
    assert!(!batch.snapshots[0].is_leader());
    assert!(!batch.complete);
}

#[test]
fn market_state_signal_decodes() {
    let msg = decode_ok(json!({
        "type": "market_state",
        "is_open": true,
        "snapshot_count": 12,
        "market_day_count": 3
    }));

    assert_eq!(
        msg,
        TransportMessage::MarketState(MarketState {
            is_open: true,
            snapshot_count: 12,
            market_day_count: 3
        })
    );
}

#[test]
fn unknown_message_types_are_skipped() {
    let out = decode(&json!({ "type": "heartbeat" }).to_string()).unwrap();
    assert!(out.is_none());
}

#[test]
fn garbage_is_a_decode_error() {
    assert!(matches!(decode("{not json"), Err(WireError::Decode(_))));
}

#[test]
fn pushed_new_leader_is_normalised() {
    let msg = decode_ok(json!({
        "type": "event",
        "event_type": "new_leader",
        "stock": { "ticker": "BBB", "title": "Beta", "price": 12.0, "percent_change": 4.0 },
        "metadata": { "previous_leader_ticker": "AAA" }
    }));

    let TransportMessage::Event(event) = msg else {
        panic!("expected an event");
    };

    assert_eq!(event.event_type(), EventType::NewLeader);
    match event.payload {
        EventPayload::NewLeader {
            leader,
            previous_leader_ticker,
        } => {
            assert_eq!(leader.ticker, "BBB");
            assert_eq!(leader.rank, 1);
            assert_eq!(previous_leader_ticker, "AAA");
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn pushed_crash_defaults_percent_from_stock() {
    let payload = normalize_event(WireEvent {
        event_type: "big_crash".into(),
        stock: Some(json!({ "ticker": "AAA", "title": "", "price": 5.0, "percent_change": -14.0 })),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(
        payload,
        EventPayload::Crash {
            stock: market::types::StockSnapshot {
                ticker: "AAA".into(),
                title: String::new(),
                price: 5.0,
                percent_change: -14.0,
                rank: 0,
                image: None,
            },
            crash_percent: -14.0,
            previous_price: None,
        }
    );
}

#[test]
fn pushed_market_close_splits_leader_and_top_mover() {
    let msg = decode_ok(json!({
        "type": "event",
        "event_type": "market_close",
        "leader": { "ticker": "LEAD", "title": "", "price": 90.0, "percent_change": 1.0, "rank": 1 },
        "stock": { "ticker": "MOVR", "title": "", "price": 20.0, "percent_change": 30.0 },
        "metadata": { "market_day": 2, "snapshots_per_day": 30 }
    }));

    let TransportMessage::Event(event) = msg else {
        panic!("expected an event");
    };
    match event.payload {
        EventPayload::MarketClose {
            leader,
            top_mover,
            market_day,
            snapshots_per_day,
        } => {
            assert_eq!(leader.unwrap().ticker, "LEAD");
            assert_eq!(top_mover.unwrap().ticker, "MOVR");
            assert_eq!(market_day, 2);
            assert_eq!(snapshots_per_day, Some(30));
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn pushed_event_missing_required_metadata_is_rejected() {
    let err = normalize_event(WireEvent {
        event_type: "market_open".into(),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(
        err,
        WireError::MissingField {
            field: "market_day",
            ..
        }
    ));

    let err = normalize_event(WireEvent {
        event_type: "confetti".into(),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(err, WireError::UnknownEventType(t) if t == "confetti"));
}

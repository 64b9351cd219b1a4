use candles_ws::candles::{Aggregator, EmitCursor, TradeOutcome, TradeRejection};

use crate::support::trade;

const PERIOD: i64 = 1_000;

fn opened_bucket(outcome: TradeOutcome) -> i64 {
    match outcome {
        TradeOutcome::Folded {
            candle,
            opened: true,
            ..
        } => candle.bucket_ms,
        other => panic!("expected a new bucket, got {other:?}"),
    }
}

#[test]
fn ignores_trades_before_start() {
    let mut agg = Aggregator::new(PERIOD, 5_000, 3);

    assert_eq!(
        agg.on_trade(&trade(100.0, 1, 4_999), None),
        TradeOutcome::IgnoredBeforeStart
    );
    // Start check runs before validation.
    assert_eq!(
        agg.on_trade(&trade(f64::NAN, 0, 0), None),
        TradeOutcome::IgnoredBeforeStart
    );
    assert!(agg.ring().is_empty());

    assert_eq!(opened_bucket(agg.on_trade(&trade(100.0, 1, 5_000), None)), 5_000);
}

#[test]
fn rejects_malformed_trades_without_touching_the_ring() {
    let mut agg = Aggregator::new(PERIOD, 0, 3);

    assert_eq!(
        agg.on_trade(&trade(100.0, 0, 10), None),
        TradeOutcome::Rejected(TradeRejection::ZeroSize)
    );
    assert!(matches!(
        agg.on_trade(&trade(f64::NAN, 1, 10), None),
        TradeOutcome::Rejected(TradeRejection::NonFinitePrice(_))
    ));
    assert!(agg.ring().is_empty());
}

#[test]
fn folds_trades_of_one_bucket() {
    let mut agg = Aggregator::new(PERIOD, 0, 3);

    assert_eq!(opened_bucket(agg.on_trade(&trade(100.0, 5, 0), None)), 0);
    match agg.on_trade(&trade(105.0, 5, 10), None) {
        TradeOutcome::Folded {
            candle,
            opened,
            evicted,
        } => {
            assert!(!opened);
            assert_eq!(evicted, None);
            assert_eq!(
                (candle.open, candle.high, candle.low, candle.close, candle.volume),
                (100.0, 105.0, 100.0, 105.0, 10)
            );
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(agg.ring().len(), 1);
}

#[test]
fn new_bucket_evicts_oldest_when_full() {
    let mut agg = Aggregator::new(PERIOD, 0, 3);
    for ts in [0, 1_000, 2_000] {
        agg.on_trade(&trade(100.0, 1, ts), None);
    }

    match agg.on_trade(&trade(101.0, 1, 3_500), None) {
        TradeOutcome::Folded {
            candle, evicted, ..
        } => {
            assert_eq!(candle.bucket_ms, 3_000);
            assert_eq!(evicted.map(|c| c.bucket_ms), Some(0));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let keys: Vec<i64> = agg.ring().snapshot().iter().map(|c| c.bucket_ms).collect();
    assert_eq!(keys, vec![1_000, 2_000, 3_000]);
}

#[test]
fn late_trade_for_resident_bucket_is_a_correction() {
    let mut agg = Aggregator::new(PERIOD, 0, 3);
    agg.on_trade(&trade(100.0, 5, 0), None);
    agg.on_trade(&trade(101.0, 1, 1_200), None);

    match agg.on_trade(&trade(110.0, 2, 900), Some(0)) {
        TradeOutcome::Correction(candle) => {
            assert_eq!(candle.bucket_ms, 0);
            assert_eq!(candle.high, 110.0);
            assert_eq!(candle.close, 110.0);
            assert_eq!(candle.volume, 7);
        }
        other => panic!("expected correction, got {other:?}"),
    }

    // Not yet emitted: a regular fold.
    assert!(matches!(
        agg.on_trade(&trade(99.0, 1, 1_300), Some(0)),
        TradeOutcome::Folded { opened: false, .. }
    ));
}

#[test]
fn late_trade_for_evicted_bucket_is_dropped_without_mutation() {
    let mut agg = Aggregator::new(PERIOD, 0, 3);
    for ts in [0, 1_000, 2_000, 3_000] {
        agg.on_trade(&trade(100.0, 1, ts), None);
    }
    let before = agg.ring().snapshot();

    assert_eq!(
        agg.on_trade(&trade(50.0, 1, 500), Some(2_000)),
        TradeOutcome::DroppedStale { bucket_ms: 0 }
    );
    assert_eq!(agg.ring().snapshot(), before);
}

#[test]
fn bucket_older_than_every_resident_is_dropped() {
    let mut agg = Aggregator::new(PERIOD, 0, 3);
    for ts in [1_000, 2_000, 3_000] {
        agg.on_trade(&trade(100.0, 1, ts), None);
    }
    let before = agg.ring().snapshot();

    // Nothing emitted yet, but evicting 1_000 for 0 would lose newer data.
    assert_eq!(
        agg.on_trade(&trade(50.0, 1, 10), None),
        TradeOutcome::DroppedStale { bucket_ms: 0 }
    );
    assert_eq!(agg.ring().snapshot(), before);
}

#[test]
fn late_trade_with_free_slot_opens_a_correction() {
    let mut agg = Aggregator::new(PERIOD, 0, 3);
    agg.on_trade(&trade(100.0, 1, 2_000), None);

    match agg.on_trade(&trade(90.0, 3, 1_100), Some(2_000)) {
        TradeOutcome::Correction(candle) => {
            assert_eq!(candle.bucket_ms, 1_000);
            assert_eq!(candle.open, 90.0);
            assert_eq!(candle.volume, 3);
        }
        other => panic!("expected correction, got {other:?}"),
    }
    assert_eq!(agg.ring().len(), 2);
}

#[test]
fn quiet_ring_does_not_reopen_buckets_past_the_buffer() {
    // Three slots: two periods of buffer behind the live bucket.
    let mut agg = Aggregator::new(PERIOD, 0, 3);
    let mut cursor = EmitCursor::new(0, PERIOD);
    for _ in 0..100 {
        cursor.tick(agg.ring());
    }
    assert_eq!(cursor.last_emitted(), Some(99_000));
    assert!(agg.ring().is_empty());

    assert_eq!(
        agg.on_trade(&trade(50.0, 1, 0), cursor.last_emitted()),
        TradeOutcome::DroppedStale { bucket_ms: 0 }
    );
    assert!(agg.ring().is_empty());

    assert!(matches!(
        agg.on_trade(&trade(50.0, 1, 97_000), cursor.last_emitted()),
        TradeOutcome::Correction(c) if c.bucket_ms == 97_000
    ));
}

#[test]
fn explicit_buffer_bounds_corrections() {
    let mut agg = Aggregator::new(PERIOD, 0, 8).with_buffer_ms(5_000);
    assert_eq!(agg.buffer_ms(), 5_000);

    assert_eq!(
        agg.on_trade(&trade(50.0, 1, 4_999), Some(10_000)),
        TradeOutcome::DroppedStale { bucket_ms: 4_000 }
    );
    assert!(matches!(
        agg.on_trade(&trade(50.0, 1, 5_000), Some(10_000)),
        TradeOutcome::Correction(c) if c.bucket_ms == 5_000
    ));
    assert_eq!(agg.ring().len(), 1);
}

//! Per-trade accumulation and the late-arrival policy.

use tracing::trace;

use super::bucket::bucket_of;
use super::ring::{CandleRing, SlotKind};
use super::{Candle, TradeEvent, TradeRejection};

/// Result of folding one trade.
///
/// The aggregator never talks to a sink itself; callers decide what to emit from this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradeOutcome {
    /// Timestamp precedes the configured start (first partial bar).
    IgnoredBeforeStart,
    /// Malformed event, nothing touched.
    Rejected(TradeRejection),
    /// Folded into a live (not yet emitted) bucket.
    Folded {
        candle: Candle,
        opened: bool,
        /// Bucket pushed out of the ring to make room, if any.
        evicted: Option<Candle>,
    },
    /// Folded into an already emitted bucket; the updated candle must be re-emitted.
    Correction(Candle),
    /// Bucket aged out of the ring or the correction window; nothing touched.
    DroppedStale { bucket_ms: i64 },
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    period_ms: i64,
    start_at_ms: i64,
    /// How far behind the last emitted bucket a correction may still open a bucket.
    buffer_ms: i64,
    ring: CandleRing,
}

impl Aggregator {
    /// Correction window defaults to what the ring can hold behind the live bucket.
    pub fn new(period_ms: i64, start_at_ms: i64, ring_capacity: usize) -> Self {
        let ring = CandleRing::new(ring_capacity);
        let behind_live = i64::try_from(ring.capacity() - 1).unwrap_or(i64::MAX);
        Self {
            period_ms,
            start_at_ms,
            buffer_ms: behind_live.saturating_mul(period_ms),
            ring,
        }
    }

    pub fn with_buffer_ms(mut self, buffer_ms: i64) -> Self {
        self.buffer_ms = buffer_ms;
        self
    }

    pub fn period_ms(&self) -> i64 {
        self.period_ms
    }

    pub fn buffer_ms(&self) -> i64 {
        self.buffer_ms
    }

    pub fn start_at_ms(&self) -> i64 {
        self.start_at_ms
    }

    pub fn ring(&self) -> &CandleRing {
        &self.ring
    }

    /// Fold `trade` into its bucket.
    ///
    /// `last_emitted` is the most recently emitted interval start, `None` before the first
    /// emission tick. A trade is late when its bucket is at or before it.
    pub fn on_trade(&mut self, trade: &TradeEvent, last_emitted: Option<i64>) -> TradeOutcome {
        if trade.ts_ms < self.start_at_ms {
            return TradeOutcome::IgnoredBeforeStart;
        }
        if let Err(rejection) = trade.validate() {
            return TradeOutcome::Rejected(rejection);
        }

        let bucket = bucket_of(trade.ts_ms, self.period_ms);
        let late = last_emitted.is_some_and(|emitted| bucket <= emitted);

        if !self.ring.contains(bucket) {
            // Opening a bucket behind the emit cursor is bounded by the buffer, whatever the
            // ring occupancy.
            let outside_buffer = last_emitted
                .is_some_and(|emitted| bucket < emitted.saturating_sub(self.buffer_ms));
            // Allocating would evict; refuse when the bucket can no longer be represented.
            let aged_out = !self.ring.has_vacancy()
                && (late
                    || self
                        .ring
                        .oldest_resident_key()
                        .is_some_and(|oldest| bucket < oldest));
            if outside_buffer || aged_out {
                return TradeOutcome::DroppedStale { bucket_ms: bucket };
            }
        }

        let handle = self.ring.find_or_allocate(bucket);
        let slot = self.ring.candle_mut(handle.index);
        let opened = slot.is_none();
        let candle = match slot.as_mut() {
            Some(candle) => {
                candle.fold(trade);
                *candle
            }
            None => *slot.insert(Candle::opened(bucket, trade)),
        };

        trace!(ring = ?self.ring.snapshot(), "ring after fold");

        if late {
            return TradeOutcome::Correction(candle);
        }

        let evicted = match handle.kind {
            SlotKind::Evicted { candle, .. } => candle,
            SlotKind::Resident | SlotKind::Vacant => None,
        };
        TradeOutcome::Folded {
            candle,
            opened,
            evicted,
        }
    }
}

//! Candlestick aggregation core.
//!
//! Everything in here is synchronous and allocation-free on the hot path:
//! - [`bucket`] maps event timestamps onto aligned interval starts,
//! - [`ring::CandleRing`] keeps a fixed number of resident buckets (oldest-first eviction),
//! - [`aggregator::Aggregator`] folds trades into the ring and classifies late arrivals,
//! - [`emitter::EmitCursor`] walks completed intervals once per period.
//!
//! The async wiring (actor, queues, clock) lives in [`crate::engine`] and [`crate::pipeline`].

use thiserror::Error;

pub mod aggregator;
pub mod bucket;
pub mod emitter;
pub mod ring;

pub use aggregator::{Aggregator, TradeOutcome};
pub use bucket::{bucket_of, next_boundary_ms};
pub use emitter::{EmitCursor, EmitSchedule};
pub use ring::{CandleRing, SlotHandle};

/// One trade tick as delivered by the ingress adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeEvent {
    pub price: f64,
    pub size: u64,
    pub ts_ms: i64,
}

impl TradeEvent {
    pub fn new(price: f64, size: u64, ts_ms: i64) -> Self {
        Self { price, size, ts_ms }
    }

    /// Reject events that would break the OHLCV invariants if folded.
    pub fn validate(&self) -> Result<(), TradeRejection> {
        if !self.price.is_finite() {
            return Err(TradeRejection::NonFinitePrice(self.price));
        }
        if self.price <= 0.0 {
            return Err(TradeRejection::NonPositivePrice(self.price));
        }
        if self.size == 0 {
            return Err(TradeRejection::ZeroSize);
        }
        Ok(())
    }
}

/// Why a trade event was refused before touching the ring.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TradeRejection {
    #[error("price is not finite ({0})")]
    NonFinitePrice(f64),
    #[error("price must be positive ({0})")]
    NonPositivePrice(f64),
    #[error("size must be positive")]
    ZeroSize,
}

/// OHLCV candlestick for one aligned bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Interval start in unix milliseconds (always a multiple of the period).
    pub bucket_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    /// Candle opened by the first trade of a bucket.
    pub fn opened(bucket_ms: i64, trade: &TradeEvent) -> Self {
        Self {
            bucket_ms,
            open: trade.price,
            high: trade.price,
            low: trade.price,
            close: trade.price,
            volume: trade.size,
        }
    }

    /// Fold a subsequent trade into this candle.
    ///
    /// The high check wins over the low check for the same trade; a price can only ever move
    /// one of the two extremes.
    pub fn fold(&mut self, trade: &TradeEvent) {
        self.close = trade.price;
        if trade.price > self.high {
            self.high = trade.price;
        } else if trade.price < self.low {
            self.low = trade.price;
        }
        self.volume = self.volume.saturating_add(trade.size);
    }
}

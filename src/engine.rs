//! Candle engine actor.
//!
//! One actor per instrument stream owns the ring, the aggregator and the emit cursor.
//! Trades and emit ticks arrive through the same mailbox, so a tick always observes a slot
//! either before or after a whole fold, never halfway through one.

use kameo::Reply;
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage};
use thiserror::Error;
use tracing::{debug, warn};

use crate::candles::{Aggregator, Candle, EmitCursor, TradeEvent, TradeOutcome};
use crate::config::{CandleConfig, ConfigError};
use crate::sink::{CandleSink, Emission};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("candle engine is not running")]
    Stopped,
}

/// Fold one trade.
#[derive(Debug, Clone, Copy)]
pub struct Ingest(pub TradeEvent);

/// Emit the just-completed interval and advance the read cursor.
#[derive(Debug, Clone, Copy)]
pub struct EmitTick;

#[derive(Debug, Clone, Copy)]
pub struct GetStats;

#[derive(Debug, Clone, Copy)]
pub struct GetSnapshot;

/// Counters since the engine started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Reply)]
pub struct EngineStats {
    pub folded: u64,
    pub opened: u64,
    pub evicted: u64,
    pub corrections: u64,
    pub dropped_stale: u64,
    pub ignored_before_start: u64,
    pub rejected: u64,
    pub emitted: u64,
    pub no_data: u64,
    pub resident: usize,
}

/// Resident buckets plus cursor positions.
#[derive(Debug, Clone, PartialEq, Reply)]
pub struct RingSnapshot {
    /// Resident candles ordered by bucket start.
    pub candles: Vec<Candle>,
    pub capacity: usize,
    pub next_emit_ms: i64,
    pub last_emitted_ms: Option<i64>,
}

/// Reply to [`EmitTick`].
#[derive(Debug, Clone, Copy, PartialEq, Reply)]
pub struct Emitted(pub Emission);

pub struct CandleEngine<S: CandleSink> {
    aggregator: Aggregator,
    cursor: EmitCursor,
    sink: S,
    stats: EngineStats,
}

impl<S: CandleSink> CandleEngine<S> {
    pub fn new(config: &CandleConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let period_ms = config.period_ms();
        Ok(Self {
            aggregator: Aggregator::new(period_ms, config.start_at_ms, config.ring_capacity())
                .with_buffer_ms(config.buffer_ms()),
            cursor: EmitCursor::new(config.start_at_ms, period_ms),
            sink,
            stats: EngineStats::default(),
        })
    }

    /// Fold a trade and emit a correction when it landed in an already emitted bucket.
    pub fn ingest(&mut self, trade: &TradeEvent) -> TradeOutcome {
        let outcome = self.aggregator.on_trade(trade, self.cursor.last_emitted());
        match outcome {
            TradeOutcome::IgnoredBeforeStart => {
                self.stats.ignored_before_start += 1;
                debug!(
                    ts_ms = trade.ts_ms,
                    start_at_ms = self.aggregator.start_at_ms(),
                    "ignoring trade before start"
                );
            }
            TradeOutcome::Rejected(reason) => {
                self.stats.rejected += 1;
                debug!(?trade, %reason, "dropping malformed trade");
            }
            TradeOutcome::Folded {
                candle,
                opened,
                evicted,
            } => {
                self.stats.folded += 1;
                if opened {
                    self.stats.opened += 1;
                }
                if let Some(old) = evicted {
                    self.stats.evicted += 1;
                    debug!(bucket_ms = old.bucket_ms, "evicted oldest bucket");
                }
                debug!(
                    bucket_ms = candle.bucket_ms,
                    close = candle.close,
                    volume = candle.volume,
                    "folded trade"
                );
            }
            TradeOutcome::Correction(candle) => {
                self.stats.folded += 1;
                self.stats.corrections += 1;
                debug!(bucket_ms = candle.bucket_ms, "late trade, emitting correction");
                self.sink.emit(Emission::Correction(candle));
            }
            TradeOutcome::DroppedStale { bucket_ms } => {
                self.stats.dropped_stale += 1;
                warn!(bucket_ms, ts_ms = trade.ts_ms, "late trade outside buffer, ignored");
            }
        }
        outcome
    }

    /// Emit the interval under the read cursor and advance it.
    pub fn tick(&mut self) -> Emission {
        let emission = self.cursor.tick(self.aggregator.ring());
        match emission {
            Emission::NoData { .. } => self.stats.no_data += 1,
            Emission::Candle(_) | Emission::Correction(_) => self.stats.emitted += 1,
        }
        self.sink.emit(emission);
        emission
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            resident: self.aggregator.ring().len(),
            ..self.stats
        }
    }

    pub fn snapshot(&self) -> RingSnapshot {
        let ring = self.aggregator.ring();
        RingSnapshot {
            candles: ring.snapshot(),
            capacity: ring.capacity(),
            next_emit_ms: self.cursor.next_bucket_ms(),
            last_emitted_ms: self.cursor.last_emitted(),
        }
    }
}

impl<S: CandleSink> Actor for CandleEngine<S> {
    type Args = Self;
    type Error = std::convert::Infallible;

    async fn on_start(args: Self::Args, _actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        debug!(
            capacity = args.aggregator.ring().capacity(),
            start_at_ms = args.aggregator.start_at_ms(),
            period_ms = args.aggregator.period_ms(),
            "candle engine started"
        );
        Ok(args)
    }
}

impl<S: CandleSink> KameoMessage<Ingest> for CandleEngine<S> {
    type Reply = ();

    async fn handle(&mut self, msg: Ingest, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.ingest(&msg.0);
    }
}

impl<S: CandleSink> KameoMessage<EmitTick> for CandleEngine<S> {
    type Reply = Emitted;

    async fn handle(
        &mut self,
        _msg: EmitTick,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Emitted(self.tick())
    }
}

impl<S: CandleSink> KameoMessage<GetStats> for CandleEngine<S> {
    type Reply = EngineStats;

    async fn handle(
        &mut self,
        _msg: GetStats,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.stats()
    }
}

impl<S: CandleSink> KameoMessage<GetSnapshot> for CandleEngine<S> {
    type Reply = RingSnapshot;

    async fn handle(
        &mut self,
        _msg: GetSnapshot,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.snapshot()
    }
}

//! Wiring for one instrument stream.
//!
//! ```text
//! ingress --mpsc(bounded)--> pump --tell--> CandleEngine --emit--> sink
//!                         emit clock --ask(EmitTick)--^
//! ```
//!
//! Senders block when the inbound queue is full; trades are never dropped for lack of room.

use kameo::prelude::{Actor, ActorRef};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::candles::{Candle, EmitSchedule, TradeEvent, emitter::run_emit_clock};
use crate::config::CandleConfig;
use crate::engine::{
    CandleEngine, EmitTick, EngineError, EngineStats, GetSnapshot, GetStats, Ingest, RingSnapshot,
};
use crate::sink::{CandleSink, Emission};
use crate::time::now_ms;

pub struct CandlePipeline<S: CandleSink> {
    trades: mpsc::Sender<TradeEvent>,
    engine: ActorRef<CandleEngine<S>>,
    pump: JoinHandle<()>,
    clock: Option<JoinHandle<()>>,
}

impl<S: CandleSink> CandlePipeline<S> {
    /// Spawn with the emit clock aligned to the wall clock.
    ///
    /// The first tick fires one period after `config.start_at_ms`.
    pub fn spawn(config: CandleConfig, sink: S) -> Result<Self, EngineError> {
        let schedule =
            EmitSchedule::aligned(config.start_at_ms, config.aggregation_period, now_ms());
        Self::spawn_with_schedule(config, sink, Some(schedule))
    }

    /// Spawn with an explicit schedule, or without a clock (`None`, ticks via [`Self::tick`]).
    pub fn spawn_with_schedule(
        config: CandleConfig,
        sink: S,
        schedule: Option<EmitSchedule>,
    ) -> Result<Self, EngineError> {
        let engine = CandleEngine::new(&config, sink)?;
        let engine = CandleEngine::spawn(engine);

        let (trades, rx) = mpsc::channel(config.inbound_capacity);
        let pump = tokio::spawn(pump_trades(rx, engine.clone()));

        let clock = schedule.map(|schedule| {
            let engine = engine.clone();
            tokio::spawn(run_emit_clock(schedule, move || {
                let engine = engine.clone();
                async move {
                    match engine.ask(EmitTick).await {
                        Ok(_) => true,
                        Err(err) => {
                            warn!("emit tick failed: {err:?}");
                            false
                        }
                    }
                }
            }))
        });

        info!(
            period = ?config.aggregation_period,
            buffer = ?config.buffer_duration,
            ring_capacity = config.ring_capacity(),
            start_at_ms = config.start_at_ms,
            "candle pipeline started"
        );

        Ok(Self {
            trades,
            engine,
            pump,
            clock,
        })
    }

    /// New handle onto the inbound queue (many writers, one reader).
    pub fn sender(&self) -> mpsc::Sender<TradeEvent> {
        self.trades.clone()
    }

    /// Enqueue a trade, waiting for room if the queue is full.
    pub async fn send(&self, trade: TradeEvent) -> Result<(), EngineError> {
        self.trades.send(trade).await.map_err(|_| EngineError::Stopped)
    }

    /// Manual emit tick, for clockless pipelines.
    pub async fn tick(&self) -> Result<Emission, EngineError> {
        let emitted = self
            .engine
            .ask(EmitTick)
            .await
            .map_err(|_| EngineError::Stopped)?;
        Ok(emitted.0)
    }

    pub async fn stats(&self) -> Result<EngineStats, EngineError> {
        self.engine
            .ask(GetStats)
            .await
            .map_err(|_| EngineError::Stopped)
    }

    pub async fn snapshot(&self) -> Result<RingSnapshot, EngineError> {
        self.engine
            .ask(GetSnapshot)
            .await
            .map_err(|_| EngineError::Stopped)
    }

    /// Resident candles ordered by bucket start.
    pub async fn candles(&self) -> Result<Vec<Candle>, EngineError> {
        Ok(self.snapshot().await?.candles)
    }

    /// Stop the clock, close the inbound queue, drain it, then stop the engine.
    ///
    /// Waits for every outstanding [`Self::sender`] clone to be dropped.
    pub async fn shutdown(self) -> Result<EngineStats, EngineError> {
        let Self {
            trades,
            engine,
            pump,
            clock,
        } = self;

        if let Some(clock) = clock {
            clock.abort();
        }
        drop(trades);
        if let Err(err) = pump.await {
            warn!("trade pump ended abnormally: {err}");
        }

        let stats = engine
            .ask(GetStats)
            .await
            .map_err(|_| EngineError::Stopped)?;
        let _ = engine.stop_gracefully().await;
        info!(?stats, "candle pipeline stopped");
        Ok(stats)
    }
}

async fn pump_trades<S: CandleSink>(
    mut rx: mpsc::Receiver<TradeEvent>,
    engine: ActorRef<CandleEngine<S>>,
) {
    while let Some(trade) = rx.recv().await {
        if let Err(err) = engine.tell(Ingest(trade)).send().await {
            warn!("candle engine unavailable, stopping trade pump: {err:?}");
            break;
        }
    }
    debug!("inbound queue closed");
}

//! Outbound side: what the engine emits and where it goes.
//!
//! Sinks are called from inside the engine actor, so they must not block. Anything slow
//! belongs behind a channel ([`ChannelSink`]).

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::candles::Candle;
use crate::time::format_hms;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Emission {
    /// Completed interval, on the periodic cadence.
    Candle(Candle),
    /// Already emitted interval updated by a late trade.
    Correction(Candle),
    /// Interval without any trades.
    NoData { interval_start_ms: i64 },
}

impl Emission {
    pub fn interval_start_ms(&self) -> i64 {
        match self {
            Emission::Candle(c) | Emission::Correction(c) => c.bucket_ms,
            Emission::NoData { interval_start_ms } => *interval_start_ms,
        }
    }

    pub fn candle(&self) -> Option<&Candle> {
        match self {
            Emission::Candle(c) | Emission::Correction(c) => Some(c),
            Emission::NoData { .. } => None,
        }
    }

    pub fn is_correction(&self) -> bool {
        matches!(self, Emission::Correction(_))
    }
}

impl std::fmt::Display for Emission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Emission::NoData { interval_start_ms } => {
                write!(f, "{} - no data", format_hms(*interval_start_ms))
            }
            Emission::Candle(c) | Emission::Correction(c) => {
                if self.is_correction() {
                    f.write_str("(late) ")?;
                }
                write!(
                    f,
                    "{} - open ${:.2}, close ${:.2}, high ${:.2}, low ${:.2}, volume {}",
                    format_hms(c.bucket_ms),
                    c.open,
                    c.close,
                    c.high,
                    c.low,
                    c.volume
                )
            }
        }
    }
}

/// Receiver of completed candlesticks.
pub trait CandleSink: Send + 'static {
    fn emit(&mut self, emission: Emission);
}

/// Human-readable lines on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrinterSink;

impl CandleSink for PrinterSink {
    fn emit(&mut self, emission: Emission) {
        println!("{emission}");
    }
}

/// Structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl CandleSink for LogSink {
    fn emit(&mut self, emission: Emission) {
        match emission {
            Emission::NoData { interval_start_ms } => {
                info!(interval_start_ms, "no data");
            }
            Emission::Candle(c) | Emission::Correction(c) => {
                info!(
                    bucket_ms = c.bucket_ms,
                    open = c.open,
                    high = c.high,
                    low = c.low,
                    close = c.close,
                    volume = c.volume,
                    late = emission.is_correction(),
                    "candle"
                );
            }
        }
    }
}

/// Forwards into a bounded channel; drops (and counts) when the receiver lags.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Emission>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Emission>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sink plus its receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Emission>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Shared drop counter; stays readable after the sink moved into the engine.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        self.dropped.clone()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl CandleSink for ChannelSink {
    fn emit(&mut self, emission: Emission) {
        if let Err(err) = self.tx.try_send(emission) {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                interval_start_ms = emission.interval_start_ms(),
                dropped = total,
                "emission dropped: {err}"
            );
        }
    }
}

//! Real-time trade stream to fixed-width OHLCV candlesticks.
//!
//! The core is synchronous ([`candles`]); [`engine`] puts it behind a kameo actor and
//! [`pipeline`] wires the inbound queue and the boundary-aligned emit clock around it.
//! [`polygon`] is one concrete ingress adapter.

pub mod candles;
pub mod config;
pub mod engine;
pub mod pipeline;
pub mod polygon;
pub mod sink;
pub mod time;

pub use candles::{Candle, TradeEvent};
pub use config::{CandleConfig, ConfigError};
pub use engine::{CandleEngine, EngineError, EngineStats};
pub use pipeline::CandlePipeline;
pub use sink::{CandleSink, ChannelSink, Emission, LogSink, PrinterSink};

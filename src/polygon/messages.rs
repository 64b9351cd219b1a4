//! Polygon websocket wire types.
//!
//! Every inbound frame is a JSON array. Handshake frames carry `{"ev":"status",...}` elements;
//! after subscription, trade elements look like
//! `{"ev":"T","sym":"AAPL","p":187.12,"s":100,"c":[12,37],"t":1700000000123}`.

use serde::{Deserialize, Serialize};
use sonic_rs::JsonValueTrait;
use thiserror::Error;

use crate::candles::TradeEvent;

/// Client request (`auth`, `subscribe`).
#[derive(Debug, Clone, Serialize)]
pub struct PolygonAction<'a> {
    pub action: &'a str,
    pub params: &'a str,
}

impl<'a> PolygonAction<'a> {
    pub fn auth(api_key: &'a str) -> Self {
        Self {
            action: "auth",
            params: api_key,
        }
    }

    pub fn subscribe(params: &'a str) -> Self {
        Self {
            action: "subscribe",
            params,
        }
    }
}

/// Handshake/status element.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolygonStatus {
    pub ev: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Trade channel for a ticker, e.g. `T.AAPL`.
pub fn trade_channel(ticker: &str) -> String {
    format!("T.{ticker}")
}

/// Result of decoding one data frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodedFrame {
    pub trades: Vec<TradeEvent>,
    pub statuses: Vec<PolygonStatus>,
    /// Trade elements missing or mistyping `p`/`s`/`t`.
    pub malformed: usize,
    /// Trade elements for another symbol.
    pub foreign: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("undecodable frame: {0}")]
pub struct FrameError(pub String);

/// Decode a data frame, keeping trades for `ticker`.
///
/// Individual malformed elements are counted and skipped; only a frame that is not a JSON
/// array of objects is an error.
pub fn decode_frame(payload: &[u8], ticker: &str) -> Result<DecodedFrame, FrameError> {
    let items: Vec<sonic_rs::Value> =
        sonic_rs::from_slice(payload).map_err(|e| FrameError(e.to_string()))?;

    let mut out = DecodedFrame::default();
    for item in &items {
        match item.get("ev").and_then(|v| v.as_str()) {
            Some("T") => {
                if let Some(sym) = item.get("sym").and_then(|v| v.as_str()) {
                    if !sym.eq_ignore_ascii_case(ticker) {
                        out.foreign += 1;
                        continue;
                    }
                }
                match decode_trade(item) {
                    Some(trade) => out.trades.push(trade),
                    None => out.malformed += 1,
                }
            }
            Some("status") => out.statuses.push(PolygonStatus {
                ev: "status".to_string(),
                status: str_field(item, "status"),
                message: str_field(item, "message"),
            }),
            _ => {}
        }
    }
    Ok(out)
}

fn str_field(item: &sonic_rs::Value, key: &str) -> String {
    item.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn decode_trade(item: &sonic_rs::Value) -> Option<TradeEvent> {
    let price = item.get("p").and_then(|v| v.as_f64())?;
    let size = item.get("s").and_then(|v| {
        v.as_u64().or_else(|| {
            // Some feeds send whole share counts as floats.
            v.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        })
    })?;
    let ts_ms = item.get("t").and_then(|v| v.as_i64())?;
    Some(TradeEvent::new(price, size, ts_ms))
}

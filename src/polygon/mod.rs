//! Polygon stocks trade feed (ingress adapter).
//!
//! Flow: connect, expect `connected`, `auth` -> `auth_success`, `subscribe T.<TICKER>` ->
//! `success`, then forward every decoded trade into the inbound queue.
//!
//! There is no reconnect logic here: any transport or handshake failure ends the stream with
//! an error and the process is expected to be restarted by its supervisor.

pub mod messages;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::candles::TradeEvent;
use messages::{PolygonAction, PolygonStatus, decode_frame, trade_channel};

pub const POLYGON_STOCKS_URL: &str = "wss://socket.polygon.io/stocks";

pub const STATUS_CONNECTED: &str = "connected";
pub const STATUS_AUTH_SUCCESS: &str = "auth_success";
pub const STATUS_SUBSCRIBED: &str = "success";

#[derive(Debug, Error)]
pub enum PolygonError {
    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("expected status {expected:?} but got {got:?} ({message})")]
    UnexpectedStatus {
        expected: &'static str,
        got: String,
        message: String,
    },
    #[error("undecodable handshake frame: {0}")]
    Decode(String),
    #[error("websocket closed by server")]
    Closed,
    #[error("inbound trade queue closed")]
    QueueClosed,
}

#[derive(Debug, Clone)]
pub struct PolygonArgs {
    pub url: String,
    pub api_key: String,
    pub ticker: String,
}

impl PolygonArgs {
    pub fn new(api_key: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            url: POLYGON_STOCKS_URL.to_string(),
            api_key: api_key.into(),
            ticker: ticker.into().to_uppercase(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Authenticated, subscribed trade stream.
pub struct PolygonTradeStream {
    ws: WsStream,
    ticker: String,
}

impl PolygonTradeStream {
    /// Connect and run the handshake.
    pub async fn connect(args: &PolygonArgs) -> Result<Self, PolygonError> {
        let (mut ws, _) = connect_async(args.url.as_str()).await?;
        info!(url = %args.url, "polygon: connected");

        expect_status(&mut ws, None, STATUS_CONNECTED).await?;
        expect_status(
            &mut ws,
            Some(PolygonAction::auth(&args.api_key)),
            STATUS_AUTH_SUCCESS,
        )
        .await?;
        let channel = trade_channel(&args.ticker);
        expect_status(
            &mut ws,
            Some(PolygonAction::subscribe(&channel)),
            STATUS_SUBSCRIBED,
        )
        .await?;
        info!(%channel, "polygon: subscribed");

        Ok(Self {
            ws,
            ticker: args.ticker.clone(),
        })
    }

    /// Forward trades into `tx` until the connection fails.
    ///
    /// Blocks on a full queue. Never returns `Ok`: the feed has no natural end.
    pub async fn run(mut self, tx: mpsc::Sender<TradeEvent>) -> Result<(), PolygonError> {
        while let Some(msg) = self.ws.next().await {
            let msg = msg?;
            let payload: &[u8] = match &msg {
                Message::Text(text) => text.as_bytes(),
                Message::Binary(bytes) => bytes.as_ref(),
                Message::Close(frame) => {
                    warn!(?frame, "polygon: server closed the stream");
                    return Err(PolygonError::Closed);
                }
                _ => continue,
            };

            let frame = match decode_frame(payload, &self.ticker) {
                Ok(frame) => frame,
                Err(err) => {
                    debug!("polygon: skipping frame: {err}");
                    continue;
                }
            };
            if frame.malformed > 0 {
                debug!(count = frame.malformed, "polygon: dropped malformed trades");
            }
            for status in &frame.statuses {
                info!(status = %status.status, message = %status.message, "polygon: status");
            }
            for trade in frame.trades {
                tx.send(trade).await.map_err(|_| PolygonError::QueueClosed)?;
            }
        }
        Err(PolygonError::Closed)
    }
}

async fn expect_status(
    ws: &mut WsStream,
    request: Option<PolygonAction<'_>>,
    expected: &'static str,
) -> Result<(), PolygonError> {
    if let Some(request) = request {
        let text =
            sonic_rs::to_string(&request).map_err(|e| PolygonError::Decode(e.to_string()))?;
        ws.send(Message::text(text)).await?;
    }

    loop {
        let Some(msg) = ws.next().await else {
            return Err(PolygonError::Closed);
        };
        let msg = msg?;
        let payload: &[u8] = match &msg {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(bytes) => bytes.as_ref(),
            Message::Close(_) => return Err(PolygonError::Closed),
            _ => continue,
        };
        let statuses: Vec<PolygonStatus> =
            sonic_rs::from_slice(payload).map_err(|e| PolygonError::Decode(e.to_string()))?;
        let Some(first) = statuses.into_iter().next() else {
            return Err(PolygonError::Decode("empty status frame".to_string()));
        };
        if first.status != expected {
            return Err(PolygonError::UnexpectedStatus {
                expected,
                got: first.status,
                message: first.message,
            });
        }
        debug!(status = expected, "polygon: handshake step ok");
        return Ok(());
    }
}

//! Polygon stock trades aggregated into boundary-aligned OHLCV candles on stdout.
//!
//! Usage: polygon_candles <TICKER> [--period 30s] [--buffer 1h] [--queue 1000] [--url WS_URL] [--debug]
//!
//! Needs `POLYGON_KEY` in the environment. Logs go to stderr (`RUST_LOG`, default `info`).
//! `--debug` shrinks the ring to three slots and injects two late trades for the first
//! interval: the first one is re-emitted as a correction, the second has aged out.

use std::process::ExitCode;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use candles_ws::candles::next_boundary_ms;
use candles_ws::config::{
    DEBUG_RING_CAPACITY, DEFAULT_AGGREGATION_PERIOD, DEFAULT_BUFFER_DURATION,
    DEFAULT_INBOUND_CAPACITY, parse_duration,
};
use candles_ws::polygon::{POLYGON_STOCKS_URL, PolygonArgs, PolygonError, PolygonTradeStream};
use candles_ws::time::{format_datetime, format_hms, now_ms};
use candles_ws::{CandleConfig, CandlePipeline, ConfigError, EngineError, PrinterSink, TradeEvent};

const USAGE: &str = "Usage: polygon_candles <TICKER> [--period 30s] [--buffer 1h] [--queue 1000] [--url WS_URL] [--debug]";

/// Flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--period", "--buffer", "--queue", "--url"];

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Polygon(#[from] PolygonError),
}

fn arg_value(args: &[String], name: &str) -> Option<String> {
    let mut i = 0usize;
    while i < args.len() {
        if args[i] == name {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn first_positional(args: &[String]) -> Option<String> {
    let mut i = 1usize;
    while i < args.len() {
        let a = &args[i];
        if VALUE_FLAGS.contains(&a.as_str()) {
            i += 2;
            continue;
        }
        if !a.starts_with("--") {
            return Some(a.clone());
        }
        i += 1;
    }
    None
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn install_rustls_provider() {
    // Rustls 0.23 needs a process-wide crypto provider; keep going if one is already set.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        eprintln!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let Some(ticker) = first_positional(&args) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let Ok(api_key) = std::env::var("POLYGON_KEY") else {
        eprintln!("polygon_candles requires environment var POLYGON_KEY");
        return ExitCode::FAILURE;
    };

    match run(&args, ticker, api_key).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fatal: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String], ticker: String, api_key: String) -> Result<(), AppError> {
    install_rustls_provider();

    let period = match arg_value(args, "--period") {
        Some(raw) => parse_duration(&raw)?,
        None => DEFAULT_AGGREGATION_PERIOD,
    };
    let buffer = match arg_value(args, "--buffer") {
        Some(raw) => parse_duration(&raw)?,
        None => DEFAULT_BUFFER_DURATION,
    };
    let queue = match arg_value(args, "--queue") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| AppError::Usage(format!("invalid --queue value {raw:?}")))?,
        None => DEFAULT_INBOUND_CAPACITY,
    };
    let url = arg_value(args, "--url").unwrap_or_else(|| POLYGON_STOCKS_URL.to_string());
    let debug = has_flag(args, "--debug");

    // Validate before touching the network.
    let probe = CandleConfig::new(period, buffer, 0).with_inbound_capacity(queue);
    probe.validate()?;

    let polygon = PolygonArgs::new(api_key, ticker).with_url(url);
    let stream = PolygonTradeStream::connect(&polygon).await?;

    let now = now_ms();
    let start_at_ms = next_boundary_ms(now, probe.period_ms());
    let mut config = CandleConfig {
        start_at_ms,
        ..probe
    };
    if debug {
        config = config.with_ring_capacity(DEBUG_RING_CAPACITY);
    }
    info!(
        ticker = %polygon.ticker,
        wait_ms = start_at_ms - now,
        start_at = %format_datetime(start_at_ms),
        "waiting for {:?} interval starting {}",
        period,
        format_hms(start_at_ms)
    );

    let pipeline = CandlePipeline::spawn(config, PrinterSink)?;

    let spoofer = debug
        .then(|| tokio::spawn(spoof_late_trades(pipeline.sender(), start_at_ms, period)));
    let mut feed = tokio::spawn(stream.run(pipeline.sender()));

    let outcome = tokio::select! {
        res = &mut feed => match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(AppError::Polygon(err)),
            Err(join) => Err(AppError::Usage(format!("trade feed task failed: {join}"))),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            feed.abort();
            let _ = (&mut feed).await;
            Ok(())
        }
    };

    if let Some(spoofer) = spoofer {
        spoofer.abort();
        let _ = spoofer.await;
    }

    match pipeline.shutdown().await {
        Ok(stats) => info!(?stats, "final engine stats"),
        Err(err) => warn!("shutdown: {err}"),
    }
    outcome
}

/// Replays a trade for the first interval after two and a half, then five, periods.
///
/// The offsets sit mid-interval instead of on the 2P/4P emit boundaries, so each late trade
/// lands after the tick it follows rather than racing it.
async fn spoof_late_trades(tx: mpsc::Sender<TradeEvent>, start_at_ms: i64, period: Duration) {
    let trade = TradeEvent::new(200.0, 100, start_at_ms);
    let period_ms = period.as_millis() as i64;
    for offset_ms in [period_ms * 5 / 2, period_ms * 5] {
        let wait = (start_at_ms + offset_ms - now_ms()).max(0) as u64;
        tokio::time::sleep(Duration::from_millis(wait)).await;
        info!(ts_ms = trade.ts_ms, "debug: injecting late trade");
        if tx.send(trade).await.is_err() {
            return;
        }
    }
}

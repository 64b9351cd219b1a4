use std::time::Duration;

use candles_ws::{CandleConfig, CandlePipeline, ChannelSink, Emission};
use tokio::sync::mpsc;

use crate::support::{init_tracing, trade, wait_processed};

const WAIT: Duration = Duration::from_secs(5);

/// Pipeline without an emit clock; tests drive ticks by hand.
fn manual(
    start_at_ms: i64,
    inbound_capacity: usize,
) -> (CandlePipeline<ChannelSink>, mpsc::Receiver<Emission>) {
    let config = CandleConfig::new(Duration::from_secs(1), Duration::from_secs(60), start_at_ms)
        .with_inbound_capacity(inbound_capacity);
    let (sink, rx) = ChannelSink::channel(64);
    let pipeline = CandlePipeline::spawn_with_schedule(config, sink, None).unwrap();
    (pipeline, rx)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn trades_become_one_candle_per_interval() {
    init_tracing();
    let (pipeline, mut rx) = manual(0, 16);

    pipeline.send(trade(100.0, 5, 0)).await.unwrap();
    pipeline.send(trade(105.0, 5, 10)).await.unwrap();
    let stats = wait_processed(&pipeline, 2, WAIT).await.unwrap();
    assert_eq!(stats.folded, 2);

    let first = pipeline.tick().await.unwrap();
    let candle = first.candle().copied().unwrap();
    assert_eq!(
        (candle.bucket_ms, candle.open, candle.high, candle.low, candle.close, candle.volume),
        (0, 100.0, 105.0, 100.0, 105.0, 10)
    );
    assert_eq!(
        pipeline.tick().await.unwrap(),
        Emission::NoData {
            interval_start_ms: 1_000
        }
    );

    assert_eq!(rx.recv().await, Some(first));
    assert_eq!(
        rx.recv().await,
        Some(Emission::NoData {
            interval_start_ms: 1_000
        })
    );

    let stats = pipeline.shutdown().await.unwrap();
    assert_eq!(stats.emitted, 1);
    assert_eq!(stats.no_data, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_inbound_queue_applies_backpressure_without_loss() {
    init_tracing();
    let (pipeline, _rx) = manual(0, 1);

    for i in 0..200 {
        pipeline.send(trade(100.0 + i as f64, 1, i * 10)).await.unwrap();
    }

    let stats = pipeline.shutdown().await.unwrap();
    assert_eq!(stats.folded, 200);
    assert_eq!(stats.opened, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_producers_share_the_queue() {
    init_tracing();
    let (pipeline, _rx) = manual(0, 8);

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let tx = pipeline.sender();
            tokio::spawn(async move {
                for i in 0..25 {
                    tx.send(trade(50.0, 2, p * 1_000 + i)).await.unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    wait_processed(&pipeline, 100, WAIT).await.unwrap();
    let candles = pipeline.candles().await.unwrap();
    let buckets: Vec<i64> = candles.iter().map(|c| c.bucket_ms).collect();
    assert_eq!(buckets, vec![0, 1_000, 2_000, 3_000]);
    assert!(candles.iter().all(|c| c.volume == 50));

    let stats = pipeline.shutdown().await.unwrap();
    assert_eq!(stats.folded, 100);
    assert_eq!(stats.resident, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_first_bar_is_ignored() {
    init_tracing();
    let (pipeline, _rx) = manual(10_000, 16);

    pipeline.send(trade(99.0, 1, 9_999)).await.unwrap();
    pipeline.send(trade(100.0, 1, 10_000)).await.unwrap();
    pipeline.send(trade(0.0, 1, 10_001)).await.unwrap();

    let stats = wait_processed(&pipeline, 3, WAIT).await.unwrap();
    assert_eq!(stats.ignored_before_start, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.folded, 1);

    let first = pipeline.tick().await.unwrap();
    assert_eq!(first.interval_start_ms(), 10_000);
    assert_eq!(first.candle().map(|c| c.open), Some(100.0));

    pipeline.shutdown().await.unwrap();
}

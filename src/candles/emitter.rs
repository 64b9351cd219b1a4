//! Periodic emission: the read cursor and the boundary-aligned clock that drives it.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::ring::CandleRing;
use crate::sink::Emission;

/// Read cursor over completed intervals.
///
/// Advances by exactly one period per tick whether or not the interval held any trades.
#[derive(Debug, Clone)]
pub struct EmitCursor {
    next_bucket_ms: i64,
    period_ms: i64,
    ticks: u64,
}

impl EmitCursor {
    /// Cursor whose first tick reports the interval starting at `start_at_ms`.
    pub fn new(start_at_ms: i64, period_ms: i64) -> Self {
        Self {
            next_bucket_ms: start_at_ms,
            period_ms,
            ticks: 0,
        }
    }

    /// Interval the next tick will report.
    pub fn next_bucket_ms(&self) -> i64 {
        self.next_bucket_ms
    }

    /// Interval reported by the most recent tick; `None` before the first tick.
    pub fn last_emitted(&self) -> Option<i64> {
        (self.ticks > 0).then(|| self.next_bucket_ms - self.period_ms)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Read the just-completed interval and advance.
    pub fn tick(&mut self, ring: &CandleRing) -> Emission {
        let interval_start_ms = self.next_bucket_ms;
        let emission = match ring.get(interval_start_ms) {
            Some(candle) => Emission::Candle(*candle),
            None => Emission::NoData { interval_start_ms },
        };
        self.next_bucket_ms = self.next_bucket_ms.saturating_add(self.period_ms);
        self.ticks = self.ticks.saturating_add(1);
        emission
    }
}

/// When the emit clock fires.
#[derive(Debug, Clone, Copy)]
pub struct EmitSchedule {
    pub first_tick: Instant,
    pub period: Duration,
}

impl EmitSchedule {
    /// First tick one period after `start_at_ms` (wall clock), then every period.
    pub fn aligned(start_at_ms: i64, period: Duration, now_ms: i64) -> Self {
        let period_ms = period.as_millis().min(i64::MAX as u128) as i64;
        let wait_ms = start_at_ms
            .saturating_add(period_ms)
            .saturating_sub(now_ms)
            .max(0) as u64;
        Self {
            first_tick: Instant::now() + Duration::from_millis(wait_ms),
            period,
        }
    }
}

/// Drive `on_tick` on the schedule until it returns `false`.
///
/// Missed ticks are replayed back-to-back so a slow consumer delays, but never skips,
/// an interval.
pub async fn run_emit_clock<F, Fut>(schedule: EmitSchedule, mut on_tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut ticker = tokio::time::interval_at(schedule.first_tick, schedule.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    loop {
        ticker.tick().await;
        if !on_tick().await {
            debug!("emit clock stopped");
            break;
        }
    }
}

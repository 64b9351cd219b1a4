//! Aggregation settings and their validation.

use std::time::Duration;

use thiserror::Error;

use crate::candles::bucket::{bucket_of, ring_capacity_for};

pub const DEFAULT_AGGREGATION_PERIOD: Duration = Duration::from_secs(30);
pub const DEFAULT_BUFFER_DURATION: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_INBOUND_CAPACITY: usize = 1_000;
/// Ring size used in debug mode so eviction is observable within a few periods.
pub const DEBUG_RING_CAPACITY: usize = 3;
/// Upper bound on resident buckets; every trade scans the ring.
pub const MAX_RING_CAPACITY: usize = 4_096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("aggregation period must be a positive whole number of milliseconds (got {0:?})")]
    NonPositivePeriod(Duration),
    #[error("buffer duration {buffer:?} must exceed the aggregation period {period:?}")]
    BufferNotLongerThanPeriod { buffer: Duration, period: Duration },
    #[error("start time {start_at_ms} is not aligned to the {period_ms}ms period")]
    MisalignedStart { start_at_ms: i64, period_ms: i64 },
    #[error("inbound queue capacity must be positive")]
    ZeroInboundCapacity,
    #[error("ring capacity {0} is too small (need at least 2 slots)")]
    RingTooSmall(usize),
    #[error("ring capacity {capacity} exceeds the maximum of {max} slots (shorten the buffer or widen the period)")]
    RingTooLarge { capacity: usize, max: usize },
    #[error("invalid duration {0:?} (expected e.g. 250ms, 30s, 5m, 1h, 1d)")]
    InvalidDuration(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleConfig {
    /// Candlestick width.
    pub aggregation_period: Duration,
    /// How far back late corrections remain possible.
    pub buffer_duration: Duration,
    /// First bucket boundary; earlier trades are ignored.
    pub start_at_ms: i64,
    /// Pending trade events the inbound queue absorbs before applying backpressure.
    pub inbound_capacity: usize,
    /// Forces the ring size instead of deriving it from the buffer.
    pub ring_capacity_override: Option<usize>,
}

impl CandleConfig {
    pub fn new(aggregation_period: Duration, buffer_duration: Duration, start_at_ms: i64) -> Self {
        Self {
            aggregation_period,
            buffer_duration,
            start_at_ms,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            ring_capacity_override: None,
        }
    }

    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }

    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity_override = Some(capacity);
        self
    }

    pub fn period_ms(&self) -> i64 {
        duration_ms(self.aggregation_period)
    }

    pub fn buffer_ms(&self) -> i64 {
        duration_ms(self.buffer_duration)
    }

    /// `ceil(buffer / period) + 1` unless overridden.
    pub fn ring_capacity(&self) -> usize {
        self.ring_capacity_override
            .unwrap_or_else(|| ring_capacity_for(self.buffer_ms(), self.period_ms().max(1)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let period = self.aggregation_period;
        if period.is_zero() || period.subsec_nanos() % 1_000_000 != 0 {
            return Err(ConfigError::NonPositivePeriod(period));
        }
        if self.buffer_duration <= period {
            return Err(ConfigError::BufferNotLongerThanPeriod {
                buffer: self.buffer_duration,
                period,
            });
        }
        let period_ms = self.period_ms();
        if bucket_of(self.start_at_ms, period_ms) != self.start_at_ms {
            return Err(ConfigError::MisalignedStart {
                start_at_ms: self.start_at_ms,
                period_ms,
            });
        }
        if self.inbound_capacity == 0 {
            return Err(ConfigError::ZeroInboundCapacity);
        }
        if let Some(cap) = self.ring_capacity_override {
            if cap < 2 {
                return Err(ConfigError::RingTooSmall(cap));
            }
        }
        let capacity = self.ring_capacity();
        if capacity > MAX_RING_CAPACITY {
            return Err(ConfigError::RingTooLarge {
                capacity,
                max: MAX_RING_CAPACITY,
            });
        }
        Ok(())
    }
}

fn duration_ms(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

/// Parse `250ms`, `30s`, `5m`, `1h` or `1d`. A bare number is read as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let s = raw.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let invalid = || ConfigError::InvalidDuration(raw.to_string());

    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let ms_per_unit: u64 = match unit {
        "ms" => 1,
        "" | "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => return Err(invalid()),
    };
    value
        .checked_mul(ms_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}

//! Time bucketing.
//!
//! Periods are validated at configuration time (see [`crate::config::CandleConfig::validate`]),
//! so these helpers assume `period_ms > 0`.

/// Start of the aligned interval containing `ts_ms`.
///
/// Uses euclidean remainder so pre-epoch timestamps still land on a multiple of the period.
#[inline]
pub fn bucket_of(ts_ms: i64, period_ms: i64) -> i64 {
    debug_assert!(period_ms > 0);
    ts_ms - ts_ms.rem_euclid(period_ms)
}

/// First period boundary at or after `now_ms`.
///
/// This is where aggregation starts: trades before it belong to a partial first bar and are
/// ignored, and the emit clock's first tick lands one period later.
#[inline]
pub fn next_boundary_ms(now_ms: i64, period_ms: i64) -> i64 {
    let floor = bucket_of(now_ms, period_ms);
    if floor == now_ms {
        floor
    } else {
        floor.saturating_add(period_ms)
    }
}

/// Ring size needed to keep `buffer_ms` worth of buckets plus the live one.
///
/// Saturates instead of overflowing; callers bound the result (see
/// [`crate::config::MAX_RING_CAPACITY`]).
#[inline]
pub fn ring_capacity_for(buffer_ms: i64, period_ms: i64) -> usize {
    debug_assert!(period_ms > 0);
    let full = buffer_ms.max(0) / period_ms;
    let partial = i64::from(buffer_ms % period_ms != 0);
    let slots = full
        .checked_add(partial)
        .and_then(|n| n.checked_add(1))
        .unwrap_or(i64::MAX);
    usize::try_from(slots).unwrap_or(usize::MAX).max(1)
}

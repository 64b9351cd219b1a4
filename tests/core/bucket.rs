use candles_ws::candles::bucket::{bucket_of, next_boundary_ms, ring_capacity_for};

#[test]
fn bucket_of_aligns_down_to_period() {
    assert_eq!(bucket_of(0, 30_000), 0);
    assert_eq!(bucket_of(29_999, 30_000), 0);
    assert_eq!(bucket_of(30_000, 30_000), 30_000);
    assert_eq!(bucket_of(1_700_000_012_345, 30_000), 1_700_000_010_000);
}

#[test]
fn bucket_of_pre_epoch_timestamps() {
    assert_eq!(bucket_of(-1, 1_000), -1_000);
    assert_eq!(bucket_of(-1_000, 1_000), -1_000);
    assert_eq!(bucket_of(-1_001, 1_000), -2_000);
}

#[test]
fn next_boundary_is_inclusive() {
    assert_eq!(next_boundary_ms(0, 30_000), 0);
    assert_eq!(next_boundary_ms(30_000, 30_000), 30_000);
    assert_eq!(next_boundary_ms(30_001, 30_000), 60_000);
    assert_eq!(next_boundary_ms(1_700_000_012_345, 30_000), 1_700_000_040_000);
}

#[test]
fn ring_capacity_covers_buffer_plus_live_bucket() {
    assert_eq!(ring_capacity_for(3_600_000, 30_000), 121);
    assert_eq!(ring_capacity_for(60_000, 30_000), 3);
    assert_eq!(ring_capacity_for(100_000, 30_000), 5);
}

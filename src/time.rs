//! Small wall-clock utilities without pulling in chrono/time dependencies.
//!
//! Everything is UTC and millisecond based, matching exchange trade timestamps.

const MS_PER_DAY: i64 = 86_400_000;

/// UTC calendar date.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct UtcDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl core::fmt::Display for UtcDate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Convert a Unix timestamp (milliseconds) to a UTC date.
pub fn utc_date_from_unix_ms(ts_ms: i64) -> UtcDate {
    let days = ts_ms.div_euclid(MS_PER_DAY);
    let (y, m, d) = civil_from_days(days);
    UtcDate {
        year: y,
        month: m,
        day: d,
    }
}

/// `HH:MM:SS` (UTC) of a Unix timestamp in milliseconds.
pub fn format_hms(ts_ms: i64) -> String {
    let secs = ts_ms.rem_euclid(MS_PER_DAY) / 1_000;
    format!("{:02}:{:02}:{:02}", secs / 3_600, (secs / 60) % 60, secs % 60)
}

/// `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_datetime(ts_ms: i64) -> String {
    format!("{} {}", utc_date_from_unix_ms(ts_ms), format_hms(ts_ms))
}

/// Current Unix time in milliseconds (best-effort; 0 if the clock is before the epoch).
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let dur = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    dur.as_millis().min(i64::MAX as u128) as i64
}

/// Days since 1970-01-01 to a proleptic Gregorian `(year, month, day)`.
///
/// Howard Hinnant's `civil_from_days`, computed over 400-year eras starting on a March 1st.
fn civil_from_days(days: i64) -> (i32, u8, u8) {
    let shifted = days + 719_468;
    let era = shifted.div_euclid(146_097);
    let day_of_era = shifted.rem_euclid(146_097);
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    // Month index counted from March.
    let mp = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = era * 400 + year_of_era + i64::from(month <= 2);
    (year as i32, month as u8, day as u8)
}

// Time and percentage helpers used by both the live engine and the backtest runner.
use chrono::{DateTime, Local, NaiveTime, TimeZone, Timelike, Utc};

/// Start of the local calendar day containing `at`, expressed in UTC.
pub fn local_day_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let local = at.with_timezone(&Local);
    let midnight = local.date_naive().and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(start) => start.with_timezone(&Utc),
        // Midnight skipped by a DST jump; fall back to wall-clock seconds since midnight.
        None => at - chrono::Duration::seconds(i64::from(local.num_seconds_from_midnight())),
    }
}

pub fn is_same_local_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.with_timezone(&Local).date_naive() == b.with_timezone(&Local).date_naive()
}

/// Percentage move from `from` to `to`. Multiplies before dividing so round
/// moves (100 -> 97) come out exact.
pub fn percent_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        return 0.0;
    }
    (to - from) * 100.0 / from
}

//! Period windowing.
//!
//! A period of N days covers today plus the N-1 days before it. Platforms
//! take the window either as Unix-second timestamps (local midnight of the
//! first day to 23:59:59 today) or as ISO calendar dates.

use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use tallybar_core::Period;

/// Returns `(start, end)` Unix seconds for `period` ending today, local time.
pub fn timestamp_range(period: Period) -> (i64, i64) {
    timestamp_range_at(period, &Local::now())
}

/// Returns `(start, end)` Unix seconds for `period` ending on `now`'s day, in
/// `now`'s timezone.
pub fn timestamp_range_at<Tz: TimeZone>(period: Period, now: &DateTime<Tz>) -> (i64, i64) {
    let tz = now.timezone();
    let today = now.date_naive();
    let first = first_day(period, today);

    let start = resolve(&tz, first.and_time(NaiveTime::MIN));
    let end = resolve(&tz, today.and_time(end_of_day()));
    (start, end)
}

/// Returns `(start, end)` ISO dates (`YYYY-MM-DD`) for `period` ending today.
pub fn date_range(period: Period) -> (String, String) {
    date_range_at(period, Local::now().date_naive())
}

/// Returns `(start, end)` ISO dates for `period` ending on `today`.
pub fn date_range_at(period: Period, today: NaiveDate) -> (String, String) {
    let first = first_day(period, today);
    (
        first.format("%Y-%m-%d").to_string(),
        today.format("%Y-%m-%d").to_string(),
    )
}

fn first_day(period: Period, today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(period.days().saturating_sub(1))))
        .unwrap_or(today)
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// Resolves a local wall-clock time, taking the earlier instant across a DST
/// fold and treating a DST gap as UTC.
fn resolve<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> i64 {
    tz.from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| naive.and_utc().timestamp(), |dt| dt.timestamp())
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;

    #[test]
    fn test_one_day_window_utc() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap();
        let (start, end) = timestamp_range_at(Period::OneDay, &now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap().timestamp());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 5, 10, 23, 59, 59).unwrap().timestamp());
    }

    #[test]
    fn test_seven_day_window_uses_local_midnight() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 5, 10, 1, 0, 0).unwrap();
        let (start, end) = timestamp_range_at(Period::SevenDays, &now);
        assert_eq!(start, tz.with_ymd_and_hms(2024, 5, 4, 0, 0, 0).unwrap().timestamp());
        assert_eq!(end - start, 7 * 86_400 - 1);
    }

    #[test]
    fn test_date_range() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            date_range_at(Period::FourteenDays, today),
            ("2024-02-17".to_string(), "2024-03-01".to_string())
        );
        assert_eq!(
            date_range_at(Period::OneDay, today),
            ("2024-03-01".to_string(), "2024-03-01".to_string())
        );
    }
}

//! Calendar arithmetic for feed generation.
//!
//! All date handling in the crate goes through this module: service-day
//! sequences, operator-timezone day lookup, GTFS clock strings with the
//! past-midnight convention, and `YYYYMMDD` formatting.

use anyhow::{Result, bail};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Returns the local-midnight instant of `day` in `tz`.
///
/// On a spring-forward day where midnight does not exist, the first valid
/// instant after the gap is used; an ambiguous midnight resolves to its
/// earlier occurrence.
fn local_midnight(day: NaiveDate, tz: Tz) -> DateTime<Tz> {
    let mut naive = day.and_hms_opt(0, 0, 0).unwrap();
    loop {
        match tz.from_local_datetime(&naive) {
            chrono::LocalResult::Single(dt) => return dt,
            chrono::LocalResult::Ambiguous(earlier, _) => return earlier,
            chrono::LocalResult::None => {
                naive += chrono::Duration::hours(1);
            }
        }
    }
}

/// Generates the ordered sequence of service days to query, one
/// local-midnight instant per day from `start` through `end` (inclusive).
///
/// # Errors
///
/// Fails if `end` precedes `start`.
pub fn day_sequence(start: NaiveDate, end: NaiveDate, tz: Tz) -> Result<Vec<DateTime<Tz>>> {
    if end < start {
        bail!("`end` ({end}) cannot be before `start` ({start})");
    }
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(local_midnight(current, tz));
        current = current.succ_opt().unwrap();
    }
    Ok(days)
}

/// Returns the calendar day of `instant` in the operator timezone `tz`.
pub fn service_day(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Formats `instant` as a GTFS clock string relative to `reference_day`.
///
/// Within the reference day the output is plain `HH:mm:ss`. Past its end,
/// the hour field carries 24 per elapsed day (`25:10:00`, `49:10:00`, ...)
/// so a trip's stop sequence stays monotonically increasing across day
/// boundaries. Never wraps below `00:00:00`.
pub fn format_clock(instant: DateTime<Utc>, reference_day: NaiveDate, tz: Tz) -> String {
    let local = instant.with_timezone(&tz);
    let elapsed_days = (local.date_naive() - reference_day).num_days().max(0);
    let hours = local.hour() as i64 + 24 * elapsed_days;
    format!("{:02}:{:02}:{:02}", hours, local.minute(), local.second())
}

/// Formats a calendar day as `YYYYMMDD`, the GTFS date encoding.
pub fn format_yyyymmdd(day: NaiveDate) -> String {
    format!("{:04}{:02}{:02}", day.year(), day.month(), day.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Lisbon;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lisbon_instant(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Lisbon
            .with_ymd_and_hms(y, m, d, h, min, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_day_sequence_inclusive_bounds() {
        let days = day_sequence(date(2020, 1, 1), date(2020, 1, 3), Lisbon).unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].date_naive(), date(2020, 1, 1));
        assert_eq!(days[1].date_naive(), date(2020, 1, 2));
        assert_eq!(days[2].date_naive(), date(2020, 1, 3));
        for day in &days {
            assert_eq!((day.hour(), day.minute(), day.second()), (0, 0, 0));
        }
    }

    #[test]
    fn test_day_sequence_single_day() {
        let days = day_sequence(date(2020, 6, 15), date(2020, 6, 15), Lisbon).unwrap();
        assert_eq!(days.len(), 1);
    }

    #[test]
    fn test_day_sequence_rejects_reversed_range() {
        let result = day_sequence(date(2020, 1, 3), date(2020, 1, 1), Lisbon);
        assert!(result.is_err());
    }

    #[test]
    fn test_day_sequence_spans_dst_transition() {
        // Lisbon switches to DST on 2020-03-29
        let days = day_sequence(date(2020, 3, 28), date(2020, 3, 30), Lisbon).unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[1].date_naive(), date(2020, 3, 29));
    }

    #[test]
    fn test_service_day_follows_operator_timezone() {
        // 23:30 UTC in summer is 00:30 next day in Lisbon (UTC+1)
        let instant = Utc.with_ymd_and_hms(2020, 7, 1, 23, 30, 0).unwrap();
        assert_eq!(service_day(instant, Lisbon), date(2020, 7, 2));
    }

    #[test]
    fn test_format_clock_within_reference_day() {
        let instant = lisbon_instant(2020, 1, 1, 23, 10, 0);
        assert_eq!(format_clock(instant, date(2020, 1, 1), Lisbon), "23:10:00");
    }

    #[test]
    fn test_format_clock_past_midnight() {
        let instant = lisbon_instant(2020, 1, 2, 0, 10, 0);
        assert_eq!(format_clock(instant, date(2020, 1, 1), Lisbon), "24:10:00");
    }

    #[test]
    fn test_format_clock_two_days_out() {
        let instant = lisbon_instant(2020, 1, 3, 1, 10, 0);
        assert_eq!(format_clock(instant, date(2020, 1, 1), Lisbon), "49:10:00");
    }

    #[test]
    fn test_format_clock_never_wraps_below_zero() {
        let instant = lisbon_instant(2020, 1, 1, 23, 55, 0);
        assert_eq!(format_clock(instant, date(2020, 1, 2), Lisbon), "23:55:00");
    }

    #[test]
    fn test_format_yyyymmdd() {
        assert_eq!(format_yyyymmdd(date(2020, 1, 9)), "20200109");
        assert_eq!(format_yyyymmdd(date(2021, 12, 31)), "20211231");
    }
}

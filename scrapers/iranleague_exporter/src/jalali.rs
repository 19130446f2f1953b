//! Jalali (Persian solar) calendar conversion.
//!
//! Day arithmetic uses the 33-year arithmetic cycle anchored at Jalali year
//! 979, which lines up with 1600-01-01 in the proleptic Gregorian calendar.
//! Leap years are years whose remainder modulo 33 is one of
//! 1, 5, 9, 13, 17, 22, 26 or 30.

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone};

use crate::error::{CrawlerError, Result};

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9377;

const EPOCH_YEAR: i64 = 979;
// 1600-01-01 counted from 0001-01-01 (day 1), plus the days to Jalali 979/1/1.
const EPOCH_DAYS_FROM_CE: i64 = 584_023 + 79;
const CYCLE_YEARS: i64 = 33;
const CYCLE_DAYS: i64 = 12053;

/// Days from Jalali 979/1/1 to the first day of `year`.
fn days_before_year(year: i64) -> i64 {
    let r = year - EPOCH_YEAR;
    365 * r + r.div_euclid(CYCLE_YEARS) * 8 + (r.rem_euclid(CYCLE_YEARS) + 3) / 4
}

pub fn is_leap_year(year: i32) -> bool {
    let year = year as i64;
    days_before_year(year + 1) - days_before_year(year) == 366
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1..=6 => 31,
        7..=11 => 30,
        12 if is_leap_year(year) => 30,
        12 => 29,
        _ => 0,
    }
}

fn days_before_month(month: u32) -> i64 {
    let month = month as i64 - 1;
    if month <= 6 {
        month * 31
    } else {
        186 + (month - 6) * 30
    }
}

/// Converts a Jalali calendar day to its Gregorian equivalent.
pub fn to_gregorian(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) || day == 0 || day > days_in_month(year, month) {
        return None;
    }
    let days = days_before_year(year as i64) + days_before_month(month) + day as i64 - 1;
    i32::try_from(days + EPOCH_DAYS_FROM_CE)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Converts a Gregorian date to `(year, month, day)` in the Jalali calendar.
pub fn from_gregorian(date: NaiveDate) -> (i32, u32, u32) {
    let days = date.num_days_from_ce() as i64 - EPOCH_DAYS_FROM_CE;

    let mut year = EPOCH_YEAR + days.div_euclid(CYCLE_DAYS) * CYCLE_YEARS;
    let mut remaining = days - days_before_year(year);
    loop {
        let len = days_before_year(year + 1) - days_before_year(year);
        if remaining < len {
            break;
        }
        remaining -= len;
        year += 1;
    }

    let mut month = 1;
    while month < 12 && remaining >= days_before_month(month + 1) {
        month += 1;
    }
    let day = remaining - days_before_month(month) + 1;

    (year as i32, month, day as u32)
}

/// Parses a `YYYY/MM/DD` Jalali date into a Gregorian date.
pub fn parse_date(date: &str) -> Result<NaiveDate> {
    let parts = date
        .trim()
        .split('/')
        .map(|p| p.trim().parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| CrawlerError::InvalidDateFormat(date.to_string()))?;

    if parts.len() != 3 {
        return Err(CrawlerError::InvalidDateFormat(date.to_string()));
    }

    let (year, month, day) = (parts[0], parts[1], parts[2]);
    let in_range = |v: i64, max: i64| v >= 0 && v <= max;
    if !in_range(year, MAX_YEAR as i64) || !in_range(month, 12) || !in_range(day, 31) {
        return Err(CrawlerError::InvalidDateFormat(date.to_string()));
    }

    to_gregorian(year as i32, month as u32, day as u32)
        .ok_or_else(|| CrawlerError::InvalidDateFormat(date.to_string()))
}

/// Parses `HH:MM`; empty or whitespace-only input means midnight.
pub fn parse_time(time: &str) -> Result<NaiveTime> {
    let time = time.trim();
    if time.is_empty() {
        return Ok(NaiveTime::MIN);
    }
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| CrawlerError::InvalidTimeFormat(time.to_string()))
}

/// Converts a Jalali date and local wall-clock time at `offset` into Unix seconds.
pub fn to_timestamp(date: &str, time: &str, offset: FixedOffset) -> Result<i64> {
    let day = parse_date(date)?;
    let time = parse_time(time)?;

    offset
        .from_local_datetime(&day.and_time(time))
        .single()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| CrawlerError::InvalidDateFormat(date.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tehran() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600 + 1800).unwrap()
    }

    #[test]
    fn test_known_conversions() {
        assert_eq!(
            to_gregorian(1402, 10, 10),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
        assert_eq!(to_gregorian(1403, 1, 1), NaiveDate::from_ymd_opt(2024, 3, 20));
        assert_eq!(to_gregorian(1399, 1, 1), NaiveDate::from_ymd_opt(2020, 3, 20));
        assert_eq!(
            to_gregorian(1403, 12, 30),
            NaiveDate::from_ymd_opt(2025, 3, 20)
        );
    }

    #[test]
    fn test_leap_years() {
        let leaps: Vec<i32> = (1390..1410).filter(|y| is_leap_year(*y)).collect();
        assert_eq!(leaps, vec![1391, 1395, 1399, 1403, 1408]);
        assert_eq!(days_in_month(1402, 12), 29);
        assert_eq!(days_in_month(1403, 12), 30);
    }

    #[test]
    fn test_round_trip() {
        for year in [1, 500, 978, 979, 1300, 1402, 1403, 1499, 2500] {
            for month in 1..=12 {
                for day in 1..=days_in_month(year, month) {
                    let gregorian = to_gregorian(year, month, day).unwrap();
                    assert_eq!(
                        from_gregorian(gregorian),
                        (year, month, day),
                        "round trip failed for {}/{}/{}",
                        year,
                        month,
                        day
                    );
                }
            }
        }
    }

    #[test]
    fn test_consecutive_days_stay_consecutive() {
        let mut previous = to_gregorian(1400, 1, 1).unwrap();
        for year in 1400..1405 {
            for month in 1..=12 {
                for day in 1..=days_in_month(year, month) {
                    if (year, month, day) == (1400, 1, 1) {
                        continue;
                    }
                    let current = to_gregorian(year, month, day).unwrap();
                    assert_eq!(current - previous, Duration::days(1));
                    previous = current;
                }
            }
        }
    }

    #[test]
    fn test_to_timestamp() {
        // 2023-12-31 15:30 +03:30 == 12:00 UTC
        assert_eq!(
            to_timestamp("1402/10/10", "15:30", tehran()).unwrap(),
            1_704_024_000
        );
    }

    #[test]
    fn test_empty_time_defaults_to_midnight() {
        let midnight = to_timestamp("1402/10/10", "", tehran()).unwrap();
        assert_eq!(midnight, to_timestamp("1402/10/10", "00:00", tehran()).unwrap());
        assert_eq!(midnight, to_timestamp("1402/10/10", "   ", tehran()).unwrap());
    }

    #[test]
    fn test_offset_shifts_timestamp() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let local = to_timestamp("1402/10/10", "15:30", tehran()).unwrap();
        let in_utc = to_timestamp("1402/10/10", "15:30", utc).unwrap();
        assert_eq!(in_utc - local, 3 * 3600 + 1800);
    }

    #[test]
    fn test_invalid_dates() {
        for date in ["1402-10-10", "1402/10", "1402/10/10/1", "abcd/10/10", "", "1402/13/01", "1402/12/30", "1402/07/31"] {
            assert!(
                matches!(
                    to_timestamp(date, "15:30", tehran()),
                    Err(CrawlerError::InvalidDateFormat(_))
                ),
                "expected {:?} to be rejected",
                date
            );
        }
    }

    #[test]
    fn test_invalid_times() {
        for time in ["25:00", "15", "15:30:00", "ab:cd"] {
            assert!(
                matches!(
                    to_timestamp("1402/10/10", time, tehran()),
                    Err(CrawlerError::InvalidTimeFormat(_))
                ),
                "expected {:?} to be rejected",
                time
            );
        }
    }
}

//! Excel serial date conversion.
//!
//! Excel stores dates as floating-point serial numbers: the integer part
//! counts days since the epoch, the fractional part is the time of day.
//! The default 1900 system counts from 1899-12-31 (serial 1 = 1900-01-01)
//! and inherits the Lotus 1-2-3 bug that treats 1900 as a leap year, so
//! serial 60 names a day that does not exist. The alternative 1904 system
//! (DATEMODE = 1) counts from 1904-01-01 (serial 0).
//!
//! Whether a numeric cell is a date depends on its number format, which
//! the reader does not interpret; these helpers let callers convert
//! `Number` cells themselves using the workbook's date system flag.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Largest supported day serial (9999-12-31 in the 1900 system).
const MAX_DAY_SERIAL: i64 = 2_958_465;

fn epoch(date_1904: bool) -> NaiveDate {
    let ymd = if date_1904 {
        (1904, 1, 1)
    } else {
        (1899, 12, 31)
    };
    NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).expect("epoch date is valid")
}

/// Convert an Excel serial number to a date-time.
///
/// Returns `None` for negative, non-finite, or out-of-range serials, and
/// for serial day 60 in the 1900 system (the phantom 1900-02-29).
pub fn serial_to_datetime(serial: f64, date_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let mut days = serial.floor() as i64;
    if days > MAX_DAY_SERIAL {
        return None;
    }

    let mut secs = ((serial - serial.floor()) * SECONDS_PER_DAY).round() as u32;
    if secs >= 86_400 {
        days += 1;
        secs = 0;
    }

    let date = if date_1904 {
        epoch(true).checked_add_signed(Duration::days(days))?
    } else {
        if days == 60 {
            return None;
        }
        // Serials past the phantom leap day are off by one
        let adjusted = if days > 60 { days - 1 } else { days };
        epoch(false).checked_add_signed(Duration::days(adjusted))?
    };

    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)?;
    Some(date.and_time(time))
}

/// Convert a date-time to an Excel serial number.
///
/// The inverse of [`serial_to_datetime`]; dates before the epoch produce
/// negative serials, which Excel does not display but round-trip cleanly.
pub fn datetime_to_serial(dt: &NaiveDateTime, date_1904: bool) -> f64 {
    let raw = (dt.date() - epoch(date_1904)).num_days();
    let days = if !date_1904 && raw > 59 {
        // Skip over the phantom 1900-02-29
        raw + 1
    } else {
        raw
    };
    days as f64 + f64::from(dt.time().num_seconds_from_midnight()) / SECONDS_PER_DAY
}

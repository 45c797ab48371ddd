//! Normalization of date-like cells into `DD-MM-YYYY` strings.
//!
//! Three encodings reach this module: date instants decoded by the
//! spreadsheet reader, raw spreadsheet serial numbers, and free-form text.
//! Anything that cannot be read as a date is returned unchanged.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use log::debug;
use regex::Regex;

use crate::config::CellValue;

/// Days between the spreadsheet epoch (1899-12-30) and 1970-01-01.
pub const SPREADSHEET_EPOCH_OFFSET_DAYS: f64 = 25569.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

// Parsed dates must be later than this year to be accepted.
const MIN_ACCEPTED_YEAR: i32 = 1000;

const DISPLAY_FORMAT: &str = "%d-%m-%Y";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%a %b %d %Y",
];

fn day_month_year() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})$").expect("valid date pattern")
    })
}

/// Formats a calendar date the way every normalized cell is displayed.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DISPLAY_FORMAT).to_string()
}

/// Normalizes one cell of a date column.
///
/// Null cells become an empty string. Values that are not recognized as
/// dates are returned as they are.
pub fn normalize_date(value: &CellValue) -> CellValue {
    let parsed = match value {
        CellValue::Null => return CellValue::String(String::new()),
        CellValue::Date(dt) => Some(dt.date()),
        CellValue::Number(n) if *n > SPREADSHEET_EPOCH_OFFSET_DAYS => from_serial(*n),
        CellValue::String(s) => parse_date_text(s),
        _ => None,
    };
    match parsed {
        Some(date) => CellValue::String(format_date(date)),
        None => {
            debug!("normalize_date: leaving {:?} unchanged", value);
            value.clone()
        }
    }
}

/// Converts a spreadsheet serial day number into the UTC calendar day it falls on.
pub fn from_serial(serial: f64) -> Option<NaiveDate> {
    let seconds = ((serial - SPREADSHEET_EPOCH_OFFSET_DAYS) * SECONDS_PER_DAY).round();
    // Beyond this chrono cannot represent the date anyway.
    if !seconds.is_finite() || seconds.abs() > 8.0e12 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let instant = epoch.checked_add_signed(Duration::seconds(seconds as i64))?;
    accepted(instant.date())
}

/// Reads a date out of free text.
///
/// `D/M/Y` and `D-M-Y` with one or two digit day and month come first; two
/// digit years are taken as 20YY. A set of common unambiguous layouts is tried
/// after that.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(date) = parse_day_month_year(text) {
        return Some(date);
    }
    parse_free_form(text).and_then(accepted)
}

fn parse_day_month_year(text: &str) -> Option<NaiveDate> {
    let caps = day_month_year().captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year_digits = &caps[3];
    let mut year: i32 = year_digits.parse().ok()?;
    if year_digits.len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day).and_then(accepted)
}

fn parse_free_form(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local().date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_local().date());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(d);
        }
    }
    None
}

fn accepted(date: NaiveDate) -> Option<NaiveDate> {
    if date.year() > MIN_ACCEPTED_YEAR {
        Some(date)
    } else {
        None
    }
}

/// Reads the ISO-8601 dates stored in sessions: a plain `YYYY-MM-DD` date or
/// a full RFC 3339 timestamp.
///
/// Timestamps are moved to the local time zone before the date is taken, so
/// a local midnight written in UTC (`2024-05-16T22:00:00Z` from UTC+2) reads
/// as the day it was meant to be. The time of day is not kept.
pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Local).date_naive())
    })
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

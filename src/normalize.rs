use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::models::Cell;

// Largest serial Excel can represent (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_466.0;

/// Convert an Excel serial number (1900 date system) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial >= MAX_EXCEL_SERIAL {
        return None;
    }
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let days = serial.floor() as i64;
    let secs = ((serial - serial.floor()) * 86_400.0).round() as i64;
    Some(base + Duration::days(days) + Duration::seconds(secs))
}

/// Parse an amount from a numeric or textual cell. Grouping commas, blanks,
/// `$` and quotes are ignored; `(1,234.56)` reads as negative. Anything that
/// still doesn't parse yields `None`.
pub fn normalize_amount(cell: &Cell) -> Option<Decimal> {
    match cell {
        Cell::Number(f) if f.is_finite() => Decimal::from_f64(*f),
        Cell::Text(s) => parse_amount_str(s),
        _ => None,
    }
}

fn parse_amount_str(raw: &str) -> Option<Decimal> {
    let s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '$' | '"'))
        .collect();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return Decimal::from_str(inner).ok().map(|d| -d);
    }
    Decimal::from_str(&s).ok()
}

/// Clean free text: literal and escaped tabs/newlines become spaces, then
/// whitespace runs collapse to one space (or vanish with `remove_all_spaces`).
pub fn normalize_text(cell: &Cell, remove_all_spaces: bool) -> Option<String> {
    if matches!(cell, Cell::Empty) {
        return None;
    }
    let raw = cell.as_text();
    let replaced = raw
        .replace("\\t", " ")
        .replace("\\n", " ")
        .replace("\\r", " ");
    let clean = if remove_all_spaces {
        replaced.split_whitespace().collect::<String>()
    } else {
        replaced.split_whitespace().collect::<Vec<_>>().join(" ")
    };
    if clean.is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// Parse a calendar date, resolving ambiguous numeric dates day-first.
pub fn normalize_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Number(f) if *f >= 1.0 => excel_serial_to_datetime(*f).map(|dt| dt.date()),
        Cell::Text(s) => parse_date_dayfirst(s),
        _ => None,
    }
}

/// Same as [`normalize_date`] but rendered as `dd/mm/yyyy`.
pub fn normalize_date_text(cell: &Cell) -> Option<String> {
    normalize_date(cell).map(|d| d.format("%d/%m/%Y").to_string())
}

fn parse_date_dayfirst(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    // Drop a trailing time-of-day component, if any.
    let date_part = raw.split(|c: char| c.is_whitespace() || c == 'T').next()?;
    let parts: Vec<&str> = date_part.split(['/', '-', '.']).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let (y, m, d) = if parts[0].len() == 4 {
        (parts[0].parse::<i32>().ok()?, parts[1].parse().ok()?, parts[2].parse().ok()?)
    } else {
        let year = match parts[2].len() {
            4 => parts[2].parse::<i32>().ok()?,
            2 => {
                let yy: i32 = parts[2].parse().ok()?;
                if yy < 69 { 2000 + yy } else { 1900 + yy }
            }
            _ => return None,
        };
        (year, parts[1].parse().ok()?, parts[0].parse().ok()?)
    };
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Parse a time of day from text (`HH:MM[:SS]`), native time cells, or a
/// serial day fraction.
pub fn normalize_time(cell: &Cell) -> Option<NaiveTime> {
    match cell {
        Cell::Time(t) => Some(*t),
        Cell::DateTime(dt) => Some(dt.time()),
        Cell::Number(f) if (0.0..1.0).contains(f) => {
            let secs = (f * 86_400.0).round() as u32;
            NaiveTime::from_num_seconds_from_midnight_opt(secs.min(86_399), 0)
        }
        Cell::Text(s) => {
            let s = s.trim();
            let time_part = s.rsplit(|c: char| c.is_whitespace() || c == 'T').next()?;
            ["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"]
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(time_part, fmt).ok())
                .map(|t| t.with_nanosecond(0).unwrap_or(t))
        }
        _ => None,
    }
}

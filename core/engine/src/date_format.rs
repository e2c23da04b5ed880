//! FILENAME: core/engine/src/date_format.rs
//! PURPOSE: Date and time display formats written with moment-style tokens.
//! CONTEXT: Table configuration declares formats such as "YYYY-MM-DD",
//! "DD.MM.YYYY HH:mm" or "h:mm A". They are translated once into a chrono
//! format string, which is then used both to parse cell text and to render
//! typed values back into text.
//!
//! TOKENS:
//! - Year: YYYY, YY
//! - Month: MMMM (January), MMM (Jan), MM (01), M (1)
//! - Day: DD (05), D (5), dddd (Monday), ddd (Mon)
//! - Hour: HH (00-23), H, hh (01-12), h
//! - Minute/second: mm, m, ss, s, SSS (milliseconds)
//! - Meridiem: A (AM/PM), a (am/pm)
//! - Literal text in brackets: [at]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Default format of date columns.
pub const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD";
/// Default format of datetime columns.
pub const DEFAULT_DATETIME_FORMAT: &str = "YYYY-MM-DD HH:mm";
/// Canonical format of time columns.
pub const TIME_FORMAT: &str = "HH:mm";

/// Token table, longest tokens first so "MMMM" wins over "MM".
const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%-m"),
    ("dddd", "%A"),
    ("ddd", "%a"),
    ("DD", "%d"),
    ("D", "%-d"),
    ("HH", "%H"),
    ("H", "%-H"),
    ("hh", "%I"),
    ("h", "%-I"),
    ("mm", "%M"),
    ("m", "%-M"),
    ("SSS", "%3f"),
    ("ss", "%S"),
    ("s", "%-S"),
    ("A", "%p"),
    ("a", "%P"),
];

/// A date/time format: the user-facing pattern and its chrono translation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateFormat {
    pattern: String,
    strftime: String,
}

impl DateFormat {
    pub fn new(pattern: &str) -> Self {
        DateFormat {
            pattern: pattern.to_string(),
            strftime: translate(pattern),
        }
    }

    /// The moment-style pattern this format was built from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The equivalent chrono format string.
    pub fn strftime(&self) -> &str {
        &self.strftime
    }

    /// Renders a date. Time tokens render as midnight.
    pub fn format_date(&self, date: NaiveDate) -> String {
        self.format_datetime(date.and_time(NaiveTime::MIN))
    }

    pub fn format_datetime(&self, value: NaiveDateTime) -> String {
        let mut out = String::new();
        if write!(out, "{}", value.format(&self.strftime)).is_err() {
            return value.to_string();
        }
        out
    }

    /// Renders a time. Formats with date tokens fall back to the canonical time format.
    pub fn format_time(&self, value: NaiveTime) -> String {
        let mut out = String::new();
        if write!(out, "{}", value.format(&self.strftime)).is_ok() {
            return out;
        }
        value.format("%H:%M").to_string()
    }

    pub fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(text.trim(), &self.strftime).ok()
    }

    pub fn parse_time(&self, text: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(text.trim(), &self.strftime).ok()
    }

    /// Parses a datetime. Text holding only the date part of the format,
    /// or matching a date-only format, is read as midnight.
    pub fn parse_datetime(&self, text: &str) -> Option<NaiveDateTime> {
        let text = text.trim();
        if let Ok(value) = NaiveDateTime::parse_from_str(text, &self.strftime) {
            return Some(value);
        }
        let date_part = date_prefix(&self.strftime);
        NaiveDate::parse_from_str(text, date_part)
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN))
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        DateFormat::new(DEFAULT_DATE_FORMAT)
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

/// Translates a moment-style pattern into a chrono format string.
fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;

    'outer: while let Some(ch) = rest.chars().next() {
        if ch == '[' {
            // Bracketed literal text, copied verbatim up to the closing bracket
            let body = &rest[1..];
            let (literal, remaining) = match body.find(']') {
                Some(end) => (&body[..end], &body[end + 1..]),
                None => (body, ""),
            };
            push_literal(&mut out, literal);
            rest = remaining;
            continue;
        }

        for (token, spec) in TOKENS {
            if let Some(remaining) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = remaining;
                continue 'outer;
            }
        }

        push_literal(&mut out, &rest[..ch.len_utf8()]);
        rest = &rest[ch.len_utf8()..];
    }

    out
}

/// The part of a chrono format before its first time field.
fn date_prefix(strftime: &str) -> &str {
    const TIME_FIELDS: [&str; 11] = [
        "%H", "%-H", "%I", "%-I", "%M", "%-M", "%S", "%-S", "%3f", "%p", "%P",
    ];
    let cut = TIME_FIELDS
        .iter()
        .filter_map(|field| strftime.find(field))
        .min()
        .unwrap_or(strftime.len());
    strftime[..cut].trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == 'T')
}

fn push_literal(out: &mut String, literal: &str) {
    for c in literal.chars() {
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
    }
}

//! Timezone offset parsing and correction

use crate::error::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest accepted offset magnitude in minutes (exclusive of a full day)
const MAX_OFFSET_MINUTES: i32 = 24 * 60 - 1;

/// User-selected timezone correction for a record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimezoneOffset {
    /// Leave the resolved date untouched
    #[default]
    None,
    /// Use the offset embedded in the file's EXIF data
    Exif,
    /// Shift by an explicit offset such as `+09:00`
    Explicit(String),
}

impl TimezoneOffset {
    /// Offset in minutes to apply, given the record's embedded timezone
    pub fn effective_minutes(&self, embedded: Option<&str>) -> Option<i32> {
        match self {
            TimezoneOffset::None => None,
            TimezoneOffset::Exif => embedded.and_then(parse_offset),
            TimezoneOffset::Explicit(s) => parse_offset(s),
        }
    }
}

impl FromStr for TimezoneOffset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(TimezoneOffset::None),
            "exif" => Ok(TimezoneOffset::Exif),
            _ => match parse_offset(trimmed) {
                Some(_) => Ok(TimezoneOffset::Explicit(trimmed.to_string())),
                None => Err(Error::InvalidOffset(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for TimezoneOffset {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimezoneOffset> for String {
    fn from(value: TimezoneOffset) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimezoneOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimezoneOffset::None => f.write_str("none"),
            TimezoneOffset::Exif => f.write_str("exif"),
            TimezoneOffset::Explicit(s) => f.write_str(s),
        }
    }
}

/// Parse `±HH:MM`, `±HHMM` or `±HH` into signed minutes
///
/// `Z` is accepted as UTC.
pub fn parse_offset(s: &str) -> Option<i32> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") {
        return Some(0);
    }

    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    // A colon is only valid between hours and minutes
    if rest.contains(':') && (rest.len() != 5 || rest.as_bytes()[2] != b':') {
        return None;
    }

    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes > 59 {
        return None;
    }

    let total = hours * 60 + minutes;
    if total > MAX_OFFSET_MINUTES {
        return None;
    }
    Some(sign * total)
}

/// Shift a naive timestamp by a signed offset
///
/// The timestamp is treated as a naive instant and the offset is added
/// directly: `+09:00` moves `00:00` to `09:00`.
pub fn apply_offset(date: NaiveDateTime, minutes: i32) -> NaiveDateTime {
    date + Duration::minutes(minutes.into())
}

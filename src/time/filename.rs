//! Filename timestamp parsing

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

/// Years outside this range are treated as accidental digit runs
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1990..=2100;

/// Unix seconds for 1990-01-01 and 2100-01-01
const UNIX_RANGE: std::ops::RangeInclusive<i64> = 631_152_000..=4_102_444_800;

/// How the captures of a pattern map to a timestamp
#[derive(Debug, Clone, Copy)]
enum Layout {
    /// Six groups: year, month, day, hour, minute, second
    DateTime,
    /// Three groups: year, month, day (midnight)
    DateOnly,
    /// One group of 10 (seconds) or 13 (milliseconds) digits
    Epoch,
}

struct FilenamePattern {
    name: &'static str,
    regex: Regex,
    layout: Layout,
}

impl FilenamePattern {
    fn new(name: &'static str, pattern: &str, layout: Layout) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("filename pattern must compile"),
            layout,
        }
    }
}

/// Known date encodings, most specific first
static PATTERNS: LazyLock<Vec<FilenamePattern>> = LazyLock::new(|| {
    vec![
        // 20250101120000
        FilenamePattern::new(
            "contiguous",
            r"(?:^|\D)(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})(?:\D|$)",
            Layout::DateTime,
        ),
        // 20250101_120000, 20250101-120000
        FilenamePattern::new(
            "compact",
            r"(\d{4})(\d{2})(\d{2})[_\-](\d{2})(\d{2})(\d{2})",
            Layout::DateTime,
        ),
        // IMG20250101120000, PXL_20250101_120000123
        FilenamePattern::new(
            "camera",
            r"(?i)(?:IMG|VID|DSC|DCIM|MOV|MVI|DJI|GOPR|GP|PXL)[-_]?(\d{4})(\d{2})(\d{2})[-_]?(\d{2})(\d{2})(\d{2})",
            Layout::DateTime,
        ),
        // Screenshot 2025-01-01 at 12.00.00
        FilenamePattern::new(
            "screenshot",
            r"(?i)(?:Screenshot|Screen Shot|Capture)[-_\s]*(\d{4})[-_]?(\d{2})[-_]?(\d{2})[-_\s]*(?:at[-_\s]*)?(\d{1,2})[-_\.]?(\d{2})[-_\.]?(\d{2})",
            Layout::DateTime,
        ),
        // 2025-01-01_12-00-00, 2025-01-01 12-00-00
        FilenamePattern::new(
            "separated",
            r"(\d{4})[-_](\d{2})[-_](\d{2})[-_\s](\d{2})[-_](\d{2})[-_](\d{2})",
            Layout::DateTime,
        ),
        // IMG-20250101-WA0001
        FilenamePattern::new(
            "whatsapp",
            r"(?i)(?:IMG|VID)[-_](\d{4})(\d{2})(\d{2})[-_]WA",
            Layout::DateOnly,
        ),
        FilenamePattern::new("epoch", r"(?:^|\D)(\d{13}|\d{10})(?:\D|$)", Layout::Epoch),
        FilenamePattern::new("date_only", r"(\d{4})[-_]?(\d{2})[-_]?(\d{2})", Layout::DateOnly),
    ]
});

/// Parse a capture time encoded in a file name
///
/// The extension is ignored. Returns the first pattern that yields a valid
/// date in the accepted year range.
pub fn parse_filename_time(filename: &str) -> Option<NaiveDateTime> {
    let stem = match filename.rfind('.') {
        Some(pos) if pos > 0 => &filename[..pos],
        _ => filename,
    };

    PATTERNS.iter().find_map(|pattern| {
        let dt = pattern
            .regex
            .captures_iter(stem)
            .find_map(|caps| from_captures(&caps, pattern.layout))?;
        trace!(filename, pattern = pattern.name, "Matched filename pattern");
        Some(dt)
    })
}

fn from_captures(caps: &regex::Captures<'_>, layout: Layout) -> Option<NaiveDateTime> {
    let num = |i: usize| -> Option<u32> { caps.get(i)?.as_str().parse().ok() };

    match layout {
        Layout::DateTime => build_datetime(
            caps.get(1)?.as_str().parse().ok()?,
            num(2)?,
            num(3)?,
            num(4)?,
            num(5)?,
            num(6)?,
        ),
        Layout::DateOnly => build_datetime(
            caps.get(1)?.as_str().parse().ok()?,
            num(2)?,
            num(3)?,
            0,
            0,
            0,
        ),
        Layout::Epoch => {
            let digits = caps.get(1)?.as_str();
            let value: i64 = digits.parse().ok()?;
            let seconds = if digits.len() == 13 { value / 1000 } else { value };
            if !UNIX_RANGE.contains(&seconds) {
                return None;
            }
            DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
        }
    }
}

fn build_datetime(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<NaiveDateTime> {
    if !YEAR_RANGE.contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(name: &str) -> Option<String> {
        parse_filename_time(name).map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }

    #[test]
    fn test_camera_names() {
        assert_eq!(parsed("IMG_20250101_120000.jpg").as_deref(), Some("2025-01-01 12:00:00"));
        assert_eq!(parsed("VID_20240115_143000.mp4").as_deref(), Some("2024-01-15 14:30:00"));
        assert_eq!(parsed("PXL_20240115_143000123.jpg").as_deref(), Some("2024-01-15 14:30:00"));
        assert_eq!(parsed("IMG20240115143000.jpg").as_deref(), Some("2024-01-15 14:30:00"));
    }

    #[test]
    fn test_contiguous_run() {
        assert_eq!(parsed("20240115143000.jpg").as_deref(), Some("2024-01-15 14:30:00"));
        assert_eq!(parsed("photo-20240115143000-edit.png").as_deref(), Some("2024-01-15 14:30:00"));
    }

    #[test]
    fn test_separated_and_screenshot() {
        assert_eq!(parsed("2024-01-15_14-30-00.jpg").as_deref(), Some("2024-01-15 14:30:00"));
        assert_eq!(
            parsed("Screenshot 2024-01-15 at 14.30.00.png").as_deref(),
            Some("2024-01-15 14:30:00")
        );
    }

    #[test]
    fn test_whatsapp_is_midnight() {
        assert_eq!(parsed("IMG-20240115-WA0001.jpg").as_deref(), Some("2024-01-15 00:00:00"));
    }

    #[test]
    fn test_unix_timestamp() {
        // 2024-01-15 14:30:00 UTC
        assert_eq!(parsed("photo_1705329000.jpg").as_deref(), Some("2024-01-15 14:30:00"));
        assert_eq!(parsed("photo_1705329000000.jpg").as_deref(), Some("2024-01-15 14:30:00"));
    }

    #[test]
    fn test_invalid_dates_fall_through() {
        // Month 13 in the compact run, but the date-only part is also invalid
        assert_eq!(parsed("20241315_143000.jpg"), None);
        assert_eq!(parsed("19800101_000000.jpg"), None);
        assert_eq!(parsed("random_file.jpg"), None);
        assert_eq!(parsed("photo.jpg"), None);
        assert_eq!(parsed(".hidden"), None);
    }
}

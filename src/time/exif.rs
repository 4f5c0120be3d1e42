//! EXIF tag extraction for images

use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// EXIF tags to try for the capture date, in priority order
const DATE_TAGS: &[Tag] = &[
    Tag::DateTimeOriginal,  // When the original image was taken
    Tag::DateTimeDigitized, // When the image was digitized
    Tag::DateTime,          // File modification date/time
];

/// Sub-second tags paired with the date tags above
const SUBSEC_TAGS: &[Tag] = &[
    Tag::SubSecTimeOriginal,
    Tag::SubSecTimeDigitized,
    Tag::SubSecTime,
];

const OFFSET_TAGS: &[Tag] = &[
    Tag::OffsetTimeOriginal,
    Tag::OffsetTimeDigitized,
    Tag::OffsetTime,
];

/// Orientation values the corrector understands
const KNOWN_ORIENTATIONS: &[u16] = &[1, 3, 6, 8];

/// Embedded tags of one image; each one independently optional
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifTags {
    pub date: Option<NaiveDateTime>,
    /// Milliseconds, 0-999
    pub subsec_ms: Option<u16>,
    pub orientation: Option<u16>,
    pub timezone: Option<String>,
}

/// Read the EXIF container of `path` and pull out every tag we use
///
/// Only a container-level failure is an error; a single undecodable tag
/// just leaves that field empty.
pub fn read_exif_tags(path: &Path) -> Result<ExifTags> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::ExifRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let tags = tags_from_exif(&exif);
    trace!(?path, ?tags, "Read EXIF tags");
    Ok(tags)
}

fn tags_from_exif(exif: &Exif) -> ExifTags {
    // The sub-second tag must come from the same family as the date
    let date = DATE_TAGS.iter().enumerate().find_map(|(i, tag)| {
        let field = exif.get_field(*tag, In::PRIMARY)?;
        parse_exif_datetime(&field.display_value().to_string()).map(|dt| (i, dt))
    });

    let subsec_ms = date.and_then(|(i, _)| {
        exif.get_field(SUBSEC_TAGS[i], In::PRIMARY)
            .and_then(ascii_value)
            .and_then(|s| parse_subsec(&s))
    });

    let timezone = OFFSET_TAGS.iter().find_map(|tag| {
        exif.get_field(*tag, In::PRIMARY)
            .and_then(ascii_value)
            .filter(|s| crate::time::offset::parse_offset(s).is_some())
    });

    let orientation = exif
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .and_then(|v| u16::try_from(v).ok())
        .filter(|v| KNOWN_ORIENTATIONS.contains(v));

    ExifTags {
        date: date.map(|(_, dt)| dt),
        subsec_ms,
        orientation,
        timezone,
    }
}

fn ascii_value(field: &Field) -> Option<String> {
    match field.value {
        Value::Ascii(ref parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// Parse EXIF datetime string format: "YYYY:MM:DD HH:MM:SS"
fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_matches('"');

    let formats = [
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];

    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

/// Convert an EXIF SubSecTime string to milliseconds
///
/// The tag holds decimal fraction digits, so "5" is 500 ms and "0123" is
/// 12 ms.
fn parse_subsec(s: &str) -> Option<u16> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let mut millis: String = digits.chars().take(3).collect();
    while millis.len() < 3 {
        millis.push('0');
    }
    millis.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_exif_datetime() {
        let dt = parse_exif_datetime("2024:01:15 14:30:00").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);

        // display_value() renders with dashes
        let dt = parse_exif_datetime("2024-01-15 14:30:00").unwrap();
        assert_eq!(dt.second(), 0);

        let dt = parse_exif_datetime("\"2024:01:15 14:30:00\"").unwrap();
        assert_eq!(dt.year(), 2024);

        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_none());
        assert!(parse_exif_datetime("invalid").is_none());
    }

    #[test]
    fn test_parse_subsec() {
        assert_eq!(parse_subsec("123"), Some(123));
        assert_eq!(parse_subsec("5"), Some(500));
        assert_eq!(parse_subsec("0123"), Some(12));
        assert_eq!(parse_subsec("45 "), Some(450));
        assert_eq!(parse_subsec(""), None);
        assert_eq!(parse_subsec("abc"), None);
    }

    #[test]
    fn test_read_exif_tags_missing_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_an_image.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        assert!(matches!(
            read_exif_tags(&path),
            Err(Error::ExifRead { .. })
        ));
    }

    #[test]
    fn test_read_exif_tags_from_embedded_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagged.jpg");
        let meta = crate::orientation::EmbeddedMetadata {
            date: parse_exif_datetime("2025:01:15 10:30:00"),
            subsec_ms: Some(120),
            timezone: Some("+09:00".into()),
        };
        crate::orientation::tests::write_test_jpeg(&path, 4, 2, Some(6), &meta);

        let tags = read_exif_tags(&path).unwrap();
        assert_eq!(tags.date, meta.date);
        assert_eq!(tags.subsec_ms, Some(120));
        assert_eq!(tags.orientation, Some(6));
        assert_eq!(tags.timezone.as_deref(), Some("+09:00"));
    }

    #[test]
    fn test_unknown_orientation_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirrored.jpg");
        let meta = crate::orientation::EmbeddedMetadata::default();
        crate::orientation::tests::write_test_jpeg(&path, 4, 2, Some(2), &meta);

        let tags = read_exif_tags(&path).unwrap();
        assert_eq!(tags.orientation, None);
        assert_eq!(tags.date, None);
    }

    #[test]
    fn test_malformed_date_keeps_other_tags() {
        use crate::orientation::tests::{ascii_field, field, write_test_jpeg_with_fields};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken_date.jpg");
        write_test_jpeg_with_fields(
            &path,
            4,
            2,
            &[
                ascii_field(Tag::DateTimeOriginal, "garbage"),
                field(Tag::Orientation, Value::Short(vec![6])),
                ascii_field(Tag::OffsetTimeOriginal, "+09:00"),
            ],
        );

        let tags = read_exif_tags(&path).unwrap();
        assert_eq!(tags.date, None);
        assert_eq!(tags.subsec_ms, None);
        assert_eq!(tags.orientation, Some(6));
        assert_eq!(tags.timezone.as_deref(), Some("+09:00"));
    }
}

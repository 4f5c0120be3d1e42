//! Orientation correction
//!
//! Rotates pixel data to match the recorded orientation and writes the
//! result with an orientation tag of 1, so a second pass over the output
//! finds nothing to rotate.

use crate::error::{Error, Result};
use crate::media::{MediaRecord, RotationMode};
use chrono::NaiveDateTime;
use exif::experimental::Writer;
use exif::{Field, In, Reader, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::Path;
use tracing::{debug, warn};

/// Orientation value meaning "display as stored"
pub const ORIENTATION_NORMAL: u16 = 1;

/// Identifier that opens an EXIF APP1 segment
const EXIF_HEADER: &[u8] = b"Exif\0\0";

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_APP0: [u8; 2] = [0xFF, 0xE0];
const JPEG_APP1: [u8; 2] = [0xFF, 0xE1];

/// Offsets the writer lays out itself
const POINTER_TAGS: &[Tag] = &[
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
];

/// Clockwise rotation needed for a record, in degrees
pub fn rotation_degrees(mode: RotationMode, exif_orientation: Option<u16>) -> u16 {
    match mode {
        RotationMode::None => 0,
        RotationMode::Exif => match exif_orientation {
            Some(3) => 180,
            Some(6) => 90,
            Some(8) => 270,
            _ => 0,
        },
        RotationMode::Deg90 => 90,
        RotationMode::Deg180 => 180,
        RotationMode::Deg270 => 270,
    }
}

/// Degrees to apply to a record's output; zero for videos
pub fn degrees_for(record: &MediaRecord) -> u16 {
    if record.is_photo() {
        rotation_degrees(record.rotation_mode, record.exif_orientation)
    } else {
        0
    }
}

/// Capture metadata carried over into a re-encoded image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedMetadata {
    pub date: Option<NaiveDateTime>,
    pub subsec_ms: Option<u16>,
    pub timezone: Option<String>,
}

impl EmbeddedMetadata {
    pub fn from_record(record: &MediaRecord) -> Self {
        Self {
            date: record.exif_date,
            subsec_ms: record.subsec_time,
            timezone: record.timezone.clone(),
        }
    }
}

fn ascii(s: String) -> Value {
    Value::Ascii(vec![s.into_bytes()])
}

/// Build a TIFF-structured EXIF block
pub fn build_exif_block(orientation: Option<u16>, meta: &EmbeddedMetadata) -> Result<Vec<u8>> {
    let mut fields = Vec::new();
    let mut push = |tag: Tag, value: Value| {
        fields.push(Field {
            tag,
            ifd_num: In::PRIMARY,
            value,
        })
    };

    if let Some(orientation) = orientation {
        push(Tag::Orientation, Value::Short(vec![orientation]));
    }
    if let Some(date) = meta.date {
        push(
            Tag::DateTimeOriginal,
            ascii(date.format("%Y:%m:%d %H:%M:%S").to_string()),
        );
    }
    if let Some(ms) = meta.subsec_ms {
        push(Tag::SubSecTimeOriginal, ascii(format!("{:03}", ms)));
    }
    if let Some(ref timezone) = meta.timezone {
        push(Tag::OffsetTimeOriginal, ascii(timezone.clone()));
    }

    write_fields(&fields)
}

/// Serialize fields into a TIFF-structured EXIF block
pub(crate) fn write_fields(fields: &[Field]) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }

    let mut buf = Cursor::new(Vec::new());
    writer
        .write(&mut buf, false)
        .map_err(|e| Error::ExifWrite(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Primary, Exif and GPS fields of `source` with the orientation reset
///
/// `None` when the source has no readable EXIF data.
fn carried_fields(source: &Path) -> Option<Vec<Field>> {
    let file = File::open(source).ok()?;
    let exif = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;

    let mut fields: Vec<Field> = exif
        .fields()
        .filter(|f| f.ifd_num == In::PRIMARY)
        .filter(|f| f.tag != Tag::Orientation && !POINTER_TAGS.contains(&f.tag))
        .filter(|f| !matches!(f.value, Value::Unknown(..)))
        .cloned()
        .collect();

    fields.push(Field {
        tag: Tag::Orientation,
        ifd_num: In::PRIMARY,
        value: Value::Short(vec![ORIENTATION_NORMAL]),
    });
    Some(fields)
}

/// Attach EXIF to a freshly encoded JPEG
///
/// The source's own tags are carried over with a normal orientation. A
/// source without EXIF, or one whose tags cannot be rewritten, gets the
/// minimal block built from `meta`.
fn attach_exif(source: &Path, encoded: &[u8], meta: &EmbeddedMetadata) -> Result<Vec<u8>> {
    if let Some(fields) = carried_fields(source) {
        match write_fields(&fields).and_then(|block| embed_exif(encoded, &block)) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => warn!(?source, error = %e, "Could not carry EXIF tags over, writing minimal block"),
        }
    }

    let block = build_exif_block(Some(ORIENTATION_NORMAL), meta)?;
    embed_exif(encoded, &block)
}

/// Insert an EXIF block as an APP1 segment
///
/// The segment goes right after the JFIF APP0 segment when there is one,
/// otherwise right after the SOI marker.
pub fn embed_exif(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>> {
    if !jpeg.starts_with(&JPEG_SOI) {
        return Err(Error::ExifWrite("not a JPEG stream".into()));
    }

    let segment_len = u16::try_from(2 + EXIF_HEADER.len() + tiff.len())
        .map_err(|_| Error::ExifWrite("EXIF block exceeds one APP1 segment".into()))?;

    let split = app0_end(jpeg).unwrap_or(JPEG_SOI.len());

    let mut out = Vec::with_capacity(jpeg.len() + segment_len as usize + 2);
    out.extend_from_slice(&jpeg[..split]);
    out.extend_from_slice(&JPEG_APP1);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[split..]);
    Ok(out)
}

/// End offset of an APP0 segment directly following SOI
fn app0_end(jpeg: &[u8]) -> Option<usize> {
    let marker = jpeg.get(2..4)?;
    if marker != JPEG_APP0 {
        return None;
    }
    let len = jpeg.get(4..6)?;
    let end = 4 + u16::from_be_bytes([len[0], len[1]]) as usize;
    (end <= jpeg.len()).then_some(end)
}

/// Decode `source`, rotate it clockwise by `degrees` and write it to `target`
///
/// `format` is the format of the final destination; JPEG outputs keep the
/// source's EXIF tags with the orientation set to normal.
pub fn write_rotated(
    source: &Path,
    target: &Path,
    format: ImageFormat,
    degrees: u16,
    meta: &EmbeddedMetadata,
    jpeg_quality: u8,
) -> Result<()> {
    let rotation_error = |message: String| Error::Rotation {
        path: source.to_path_buf(),
        message,
    };

    let img = ImageReader::open(source)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| rotation_error(e.to_string()))?;

    let rotated = rotate(img, degrees);
    debug!(?source, degrees, width = rotated.width(), height = rotated.height(), "Rotated image");

    match format {
        ImageFormat::Jpeg => {
            let rgb = rotated.to_rgb8();
            let mut encoded = Vec::new();
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, jpeg_quality))
                .map_err(|e| rotation_error(e.to_string()))?;

            let bytes = attach_exif(source, &encoded, meta)?;
            fs::write(target, bytes).map_err(|e| Error::Write {
                path: target.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        // Other encoders write no orientation tag, which readers treat as normal
        other => rotated
            .save_with_format(target, other)
            .map_err(|e| rotation_error(e.to_string()))?,
    }

    Ok(())
}

fn rotate(img: DynamicImage, degrees: u16) -> DynamicImage {
    match degrees {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img,
    }
}

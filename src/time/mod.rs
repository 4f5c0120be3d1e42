//! Time extraction module
//!
//! Collects every date candidate of a media file:
//! - EXIF metadata in images (capture time, sub-seconds, offset, orientation)
//! - Filename patterns
//! - File system creation and modification time
//!
//! Resolution into one date lives in [`resolve`], timezone handling in
//! [`offset`].

pub mod exif;
pub mod filename;
pub mod offset;
pub mod resolve;

use crate::config::MediaDefaults;
use crate::media::{LogLevel, MediaRecord};
use chrono::{DateTime, Local, NaiveDateTime};
use resolve::DateSelection;
use std::fs;
use std::time::SystemTime;
use tracing::debug;

/// Fill in every candidate date, embedded tag and dimension of a record
///
/// Failures are local: a missing tag or an undecodable header only leaves
/// the corresponding field empty.
pub fn extract_metadata(record: &mut MediaRecord) {
    let path = record.original_path.clone();

    if record.is_photo() {
        match exif::read_exif_tags(&path) {
            Ok(tags) => {
                record.exif_date = tags.date;
                record.subsec_time = tags.subsec_ms;
                record.exif_orientation = tags.orientation;
                record.timezone = tags.timezone;
                if tags.date.is_none() {
                    record.log(LogLevel::Info, "EXIF data has no capture date");
                }
            }
            Err(e) => {
                debug!(?path, error = %e, "No EXIF data");
                record.log(LogLevel::Info, format!("No EXIF data: {e}"));
            }
        }

        match image::image_dimensions(&path) {
            Ok((width, height)) => {
                record.width = Some(width);
                record.height = Some(height);
            }
            Err(e) => debug!(?path, error = %e, "Could not read image dimensions"),
        }
    }

    record.filename_date = filename::parse_filename_time(&record.file_name);

    match fs::metadata(&path) {
        Ok(metadata) => {
            let modified = metadata.modified().ok().map(to_local_naive);
            // Not every filesystem records a birth time
            let created = metadata.created().ok().map(to_local_naive).or(modified);
            record.file_modified_date = modified;
            record.file_created_date = created;
            record.file_size = metadata.len();
        }
        Err(e) => {
            debug!(?path, error = %e, "Failed to read file system times");
            record.log(LogLevel::Warning, format!("Failed to read file times: {e}"));
        }
    }
}

/// Apply the per-media-type defaults and resolve the date
pub fn resolve_with_defaults(record: &mut MediaRecord, defaults: &MediaDefaults) {
    record.timezone_offset = defaults.timezone_offset.clone();
    record.rotation_mode = defaults.rotation_mode;
    record.resolve(DateSelection::Priority(&defaults.date_priority));

    if record.date_taken.is_none() {
        record.log(LogLevel::Warning, "No date candidate available");
    }
}

fn to_local_naive(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

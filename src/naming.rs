//! Destination naming
//!
//! Output layout: `<root>/YYYY/YYYY-MM/YYYY-MM-DD/YYYY-MM-DD_HH-MM-SS[-mmm][_NN].ext`

use crate::media::MediaRecord;
use crate::time::offset::apply_offset;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// File stem used when no date could be resolved
pub const UNKNOWN_DATE: &str = "unknown_date";

/// Lowercased extension of a file name, without the dot
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Local time used for naming, after timezone correction
pub fn local_time(record: &MediaRecord) -> Option<NaiveDateTime> {
    let date = record.date_taken?;
    match record
        .timezone_offset
        .effective_minutes(record.timezone.as_deref())
    {
        Some(minutes) => Some(apply_offset(date, minutes)),
        None => Some(date),
    }
}

/// File name for a record, or `None` when it has no resolved date
pub fn build_file_name(record: &MediaRecord) -> Option<String> {
    let local = local_time(record)?;
    let mut name = local.format("%Y-%m-%d_%H-%M-%S").to_string();

    if let Some(ms) = record.effective_subsec() {
        name.push_str(&format!("-{:03}", ms));
    }
    if let Some(index) = record.burst_index {
        name.push_str(&format!("_{:02}", index));
    }

    Some(with_extension(name, &extension_of(&record.file_name)))
}

/// Sentinel name for a record without a date
pub fn unknown_file_name(record: &MediaRecord) -> String {
    with_extension(UNKNOWN_DATE.to_string(), &extension_of(&record.file_name))
}

/// Date directory below the output root
pub fn build_directory(output_root: &Path, local: &NaiveDateTime) -> PathBuf {
    output_root
        .join(local.format("%Y").to_string())
        .join(local.format("%Y-%m").to_string())
        .join(local.format("%Y-%m-%d").to_string())
}

/// Full destination of a record, or `None` when it has no resolved date
pub fn build_destination(record: &MediaRecord, output_root: &Path) -> Option<PathBuf> {
    let local = local_time(record)?;
    let name = build_file_name(record)?;
    Some(build_directory(output_root, &local).join(name))
}

/// Append `_NN` to the stem of `path`
pub fn with_suffix(path: &Path, counter: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(with_extension(format!("{}_{:02}", stem, counter), &ext))
}

/// First free variant of `base`, trying `_01`, `_02`, ... in turn
///
/// A path is taken when another record already claimed it or when it exists
/// on disk.
pub fn first_free(base: &Path, claimed: &HashSet<PathBuf>) -> PathBuf {
    let mut counter = 1u32;
    loop {
        let candidate = with_suffix(base, counter);
        if !claimed.contains(&candidate) && !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn with_extension(stem: String, ext: &str) -> String {
    if ext.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, ext)
    }
}

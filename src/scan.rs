//! Directory scanning

use crate::config::media_type_for;
use crate::error::{Error, Result};
use crate::media::MediaRecord;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Name of the directory outputs are staged in before the final rename
pub const STAGING_DIR_NAME: &str = ".media-sorter-tmp";

/// Collect every supported media file below `root`
///
/// Entries are visited in file-name order so the scan order, which breaks
/// burst ties, is stable across runs. Unreadable directories are skipped.
pub fn scan_directory(root: &Path, include_videos: bool) -> Result<Vec<MediaRecord>> {
    if !root.is_dir() {
        return Err(Error::InputNotFound(root.to_path_buf()));
    }

    let mut records = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == STAGING_DIR_NAME));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = ?e.path(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(media_type) = path
            .extension()
            .and_then(OsStr::to_str)
            .and_then(|ext| media_type_for(ext, include_videos))
        else {
            continue;
        };

        let file_size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        records.push(MediaRecord::new(path.to_path_buf(), media_type, file_size));
    }

    debug!(?root, count = records.len(), "Scanned directory");
    Ok(records)
}

//! Resolution of one authoritative date from the candidate sources

use crate::media::DateSource;
use chrono::NaiveDateTime;

/// Default priority for photos
pub const PHOTO_PRIORITY: &[DateSource] = &[
    DateSource::Exif,
    DateSource::FileName,
    DateSource::FileCreated,
    DateSource::FileModified,
];

/// Default priority for videos (embedded video timestamps are not read)
pub const VIDEO_PRIORITY: &[DateSource] = &[
    DateSource::FileModified,
    DateSource::FileName,
    DateSource::FileCreated,
];

/// The four independently optional date candidates of a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateCandidates {
    pub exif: Option<NaiveDateTime>,
    pub file_name: Option<NaiveDateTime>,
    pub file_created: Option<NaiveDateTime>,
    pub file_modified: Option<NaiveDateTime>,
}

impl DateCandidates {
    pub fn get(&self, source: DateSource) -> Option<NaiveDateTime> {
        match source {
            DateSource::Exif => self.exif,
            DateSource::FileName => self.file_name,
            DateSource::FileCreated => self.file_created,
            DateSource::FileModified => self.file_modified,
            DateSource::None => None,
        }
    }
}

/// How to pick among the candidates
#[derive(Debug, Clone, Copy)]
pub enum DateSelection<'a> {
    /// First available source in this order
    Priority(&'a [DateSource]),
    /// Exactly this source; no fallback when it is missing
    Explicit(DateSource),
}

/// Select the resolved date and its source
pub fn resolve_date(
    candidates: &DateCandidates,
    selection: DateSelection<'_>,
) -> (Option<NaiveDateTime>, DateSource) {
    let explicit;
    let order: &[DateSource] = match selection {
        DateSelection::Priority(order) => order,
        DateSelection::Explicit(DateSource::None) => return (None, DateSource::None),
        DateSelection::Explicit(source) => {
            explicit = [source];
            &explicit
        }
    };

    order
        .iter()
        .find_map(|source| candidates.get(*source).map(|date| (Some(date), *source)))
        .unwrap_or((None, DateSource::None))
}

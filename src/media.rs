//! Media records and the enums that describe them
//!
//! A [`MediaRecord`] is created by the scanner, enriched by metadata
//! extraction, date resolution and burst grouping, and then driven through
//! its status lifecycle by the processor.

use crate::error::{Error, Result};
use crate::time::offset::TimezoneOffset;
use crate::time::resolve::{DateCandidates, DateSelection, resolve_date};
use chrono::{DateTime, Duration, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Photo,
    Video,
}

/// Where a resolved date came from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum DateSource {
    /// Embedded EXIF capture time
    Exif,
    /// Date encoded in the file name
    FileName,
    /// File system creation time
    FileCreated,
    /// File system modification time
    FileModified,
    /// No candidate was available
    #[default]
    None,
}

impl fmt::Display for DateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DateSource::Exif => "exif",
            DateSource::FileName => "file_name",
            DateSource::FileCreated => "file_created",
            DateSource::FileModified => "file_modified",
            DateSource::None => "none",
        };
        f.write_str(name)
    }
}

/// How the output image should be rotated
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
pub enum RotationMode {
    /// Never rotate
    #[default]
    #[serde(rename = "none")]
    #[value(name = "none")]
    None,
    /// Rotate according to the embedded orientation tag
    #[serde(rename = "exif")]
    #[value(name = "exif")]
    Exif,
    #[serde(rename = "90")]
    #[value(name = "90")]
    Deg90,
    #[serde(rename = "180")]
    #[value(name = "180")]
    Deg180,
    #[serde(rename = "270")]
    #[value(name = "270")]
    Deg270,
}

/// Processing status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
    NoChange,
}

impl Status {
    /// Whether the lifecycle allows moving from `self` to `next`
    ///
    /// `Error -> Processing` is the retry path; everything else follows
    /// pending -> processing -> {completed, error, no_change}.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Processing)
                | (Status::Error, Status::Processing)
                | (Status::Processing, Status::Completed)
                | (Status::Processing, Status::Error)
                | (Status::Processing, Status::NoChange)
        )
    }

    /// Final states a record can end a batch in
    pub fn is_finished(self) -> bool {
        matches!(self, Status::Completed | Status::Error | Status::NoChange)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Error => "error",
            Status::NoChange => "no_change",
        };
        f.write_str(name)
    }
}

/// Severity of a per-record log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// One line of a record's user-facing log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

/// Everything known about one scanned file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub original_path: PathBuf,
    pub file_name: String,
    pub media_type: MediaType,

    pub exif_date: Option<NaiveDateTime>,
    pub filename_date: Option<NaiveDateTime>,
    pub file_created_date: Option<NaiveDateTime>,
    pub file_modified_date: Option<NaiveDateTime>,

    pub date_source: DateSource,
    pub date_taken: Option<NaiveDateTime>,
    /// Sub-second part of the EXIF capture time, in milliseconds
    pub subsec_time: Option<u16>,
    /// Embedded offset string such as `+09:00`, reference only
    pub timezone: Option<String>,
    pub timezone_offset: TimezoneOffset,

    pub burst_group_id: Option<u32>,
    pub burst_index: Option<u32>,

    pub width: Option<u32>,
    pub height: Option<u32>,
    pub file_size: u64,

    pub exif_orientation: Option<u16>,
    pub rotation_mode: RotationMode,
    pub rotation_applied: bool,

    pub new_name: String,
    pub new_path: PathBuf,

    pub status: Status,
    pub progress: u8,
    pub error_message: Option<String>,
    pub logs: Vec<LogEntry>,
}

impl MediaRecord {
    /// Create a freshly scanned record
    pub fn new(original_path: PathBuf, media_type: MediaType, file_size: u64) -> Self {
        let file_name = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            original_path,
            file_name,
            media_type,
            exif_date: None,
            filename_date: None,
            file_created_date: None,
            file_modified_date: None,
            date_source: DateSource::None,
            date_taken: None,
            subsec_time: None,
            timezone: None,
            timezone_offset: TimezoneOffset::None,
            burst_group_id: None,
            burst_index: None,
            width: None,
            height: None,
            file_size,
            exif_orientation: None,
            rotation_mode: RotationMode::None,
            rotation_applied: false,
            new_name: String::new(),
            new_path: PathBuf::new(),
            status: Status::Pending,
            progress: 0,
            error_message: None,
            logs: Vec::new(),
        }
    }

    pub fn is_photo(&self) -> bool {
        self.media_type == MediaType::Photo
    }

    pub fn candidates(&self) -> DateCandidates {
        DateCandidates {
            exif: self.exif_date,
            file_name: self.filename_date,
            file_created: self.file_created_date,
            file_modified: self.file_modified_date,
        }
    }

    /// Re-resolve `date_taken` with the given selection
    pub fn resolve(&mut self, selection: DateSelection<'_>) {
        let (date, source) = resolve_date(&self.candidates(), selection);
        self.date_taken = date;
        self.date_source = source;
    }

    /// Return a copy of this record resolved against a user-chosen source
    ///
    /// `DateSource::None` clears the resolved date.
    pub fn with_date_source(&self, source: DateSource) -> Self {
        let mut record = self.clone();
        record.resolve(DateSelection::Explicit(source));
        record
    }

    /// Resolved instant including EXIF milliseconds, used for burst ordering
    pub fn precise_time(&self) -> Option<NaiveDateTime> {
        let date = self.date_taken?;
        match self.effective_subsec() {
            Some(ms) if date.nanosecond() == 0 => Some(date + Duration::milliseconds(ms.into())),
            _ => Some(date),
        }
    }

    /// Sub-second component that belongs to the resolved date
    ///
    /// Only an EXIF-resolved date carries the EXIF sub-second tag.
    pub fn effective_subsec(&self) -> Option<u16> {
        if self.date_source == DateSource::Exif {
            self.subsec_time
        } else {
            None
        }
    }

    pub fn is_burst(&self) -> bool {
        self.burst_group_id.is_some() && self.burst_index.is_some()
    }

    pub fn set_burst(&mut self, group_id: u32, index: u32) {
        self.burst_group_id = Some(group_id);
        self.burst_index = Some(index);
    }

    pub fn clear_burst(&mut self) {
        self.burst_group_id = None;
        self.burst_index = None;
    }

    /// Append a user-facing log line
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.logs.push(LogEntry {
            timestamp: Local::now(),
            level,
            message: message.into(),
        });
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub(crate) fn transition(&mut self, next: Status) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_finished() {
            self.progress = 100;
        }
        Ok(())
    }

    /// Finish the record as failed, capturing the message
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.log(LogLevel::Error, message.clone());
        self.error_message = Some(message);
        if self.status == Status::Processing {
            self.status = Status::Error;
        }
        self.progress = 100;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_status_lifecycle() {
        assert!(Status::Pending.can_transition_to(Status::Processing));
        assert!(Status::Processing.can_transition_to(Status::Completed));
        assert!(Status::Processing.can_transition_to(Status::NoChange));
        assert!(Status::Error.can_transition_to(Status::Processing));
        assert!(!Status::Pending.can_transition_to(Status::Completed));
        assert!(!Status::Completed.can_transition_to(Status::Processing));
        assert!(!Status::NoChange.can_transition_to(Status::Error));
    }

    #[test]
    fn test_transition_rejects_skipping_processing() {
        let mut record = MediaRecord::new(PathBuf::from("a.jpg"), MediaType::Photo, 0);
        assert!(record.transition(Status::Completed).is_err());
        assert_eq!(record.status, Status::Pending);

        record.transition(Status::Processing).unwrap();
        assert_eq!(record.progress, 0);
        record.transition(Status::Completed).unwrap();
        assert_eq!(record.progress, 100);
    }

    #[test]
    fn test_fail_records_message_and_log() {
        let mut record = MediaRecord::new(PathBuf::from("a.jpg"), MediaType::Photo, 0);
        record.transition(Status::Processing).unwrap();
        record.fail("disk full");

        assert_eq!(record.status, Status::Error);
        assert_eq!(record.error_message.as_deref(), Some("disk full"));
        assert_eq!(record.logs.last().unwrap().level, LogLevel::Error);
    }

    #[test]
    fn test_with_date_source_is_pure() {
        let mut record = MediaRecord::new(PathBuf::from("a.jpg"), MediaType::Photo, 0);
        record.exif_date = Some(at(10, 0, 0));
        record.file_modified_date = Some(at(18, 0, 0));
        record.resolve(DateSelection::Priority(&[DateSource::Exif, DateSource::FileModified]));

        let overridden = record.with_date_source(DateSource::FileModified);
        assert_eq!(overridden.date_source, DateSource::FileModified);
        assert_eq!(overridden.date_taken, Some(at(18, 0, 0)));
        assert_eq!(record.date_source, DateSource::Exif);

        let cleared = record.with_date_source(DateSource::None);
        assert_eq!(cleared.date_taken, None);
        assert_eq!(cleared.date_source, DateSource::None);
    }

    #[test]
    fn test_precise_time_uses_exif_subsec_only() {
        let mut record = MediaRecord::new(PathBuf::from("a.jpg"), MediaType::Photo, 0);
        record.exif_date = Some(at(10, 0, 0));
        record.file_modified_date = Some(at(10, 0, 0));
        record.subsec_time = Some(250);

        record.resolve(DateSelection::Explicit(DateSource::Exif));
        assert_eq!(
            record.precise_time(),
            Some(at(10, 0, 0) + Duration::milliseconds(250))
        );

        record.resolve(DateSelection::Explicit(DateSource::FileModified));
        assert_eq!(record.precise_time(), Some(at(10, 0, 0)));
    }

    #[test]
    fn test_record_serializes_snake_case() {
        let record = MediaRecord::new(PathBuf::from("/in/IMG_1.JPG"), MediaType::Photo, 42);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["media_type"], "photo");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["date_source"], "none");
        assert_eq!(json["rotation_mode"], "none");
        assert_eq!(json["file_name"], "IMG_1.JPG");
    }
}

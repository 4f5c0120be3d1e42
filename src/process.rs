//! Main processor with Rayon parallel processing
//!
//! Handles the core logic of:
//! - Scanning the input directory and extracting metadata in parallel
//! - Burst grouping and destination planning (single-threaded barrier)
//! - Writing, rotating and backing up files in parallel
//! - Retrying only the records that failed

use crate::burst::assign_bursts;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::media::{LogLevel, MediaRecord, RotationMode, Status};
use crate::naming::{build_destination, first_free, unknown_file_name};
use crate::orientation::{EmbeddedMetadata, degrees_for, write_rotated};
use crate::scan::{STAGING_DIR_NAME, scan_directory};
use crate::time::offset::TimezoneOffset;
use crate::time::{extract_metadata, resolve_with_defaults};
use image::ImageFormat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Level, debug, error, info, span, warn};

/// Options of the scan entry point
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub include_videos: bool,
    pub parallel: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_videos: false,
            parallel: true,
        }
    }
}

/// Options of the process entry point
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub output_dir: PathBuf,
    /// Originals are copied here before anything is written
    pub backup_dir: Option<PathBuf>,
    pub include_videos: bool,
    pub parallel: bool,
    /// Overrides the configured timezone correction of every record
    pub timezone_offset: Option<TimezoneOffset>,
    /// Remove the staging directory once the batch is done
    pub cleanup_temp: bool,
    /// Rotate photos according to their orientation tag
    pub auto_correct_orientation: bool,
}

impl ProcessOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            backup_dir: None,
            include_videos: false,
            parallel: true,
            timezone_offset: None,
            cleanup_temp: true,
            auto_correct_orientation: false,
        }
    }
}

/// Aggregated outcome of a process or retry call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    /// True when no record ended in error
    pub success: bool,
    pub total_files: usize,
    /// Records that ended completed or unchanged
    pub processed_files: usize,
    pub media: Vec<MediaRecord>,
    /// One line per failed record, in scan order
    pub errors: Vec<String>,
}

impl ProcessResult {
    pub fn from_records(media: Vec<MediaRecord>) -> Self {
        let processed_files = media
            .iter()
            .filter(|r| matches!(r.status, Status::Completed | Status::NoChange))
            .count();
        let errors: Vec<String> = media
            .iter()
            .filter(|r| r.status == Status::Error)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.original_path.display(),
                    r.error_message.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();

        Self {
            success: errors.is_empty(),
            total_files: media.len(),
            processed_files,
            media,
            errors,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }
}

/// Replay of the process phase over a stored record set
///
/// Only records whose status is `error` are redriven; everything else is
/// carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryCommand {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub backup_dir: Option<PathBuf>,
    pub parallel: bool,
    pub cleanup_temp: bool,
    pub records: Vec<MediaRecord>,
}

impl RetryCommand {
    pub fn new(input_dir: &Path, options: &ProcessOptions, records: Vec<MediaRecord>) -> Self {
        Self {
            input_dir: input_dir.to_path_buf(),
            output_dir: options.output_dir.clone(),
            backup_dir: options.backup_dir.clone(),
            parallel: options.parallel,
            cleanup_temp: options.cleanup_temp,
            records,
        }
    }

    /// Number of records a retry would redrive
    pub fn failed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == Status::Error)
            .count()
    }

    /// Re-resolve every failed record against a user-chosen date source
    pub fn with_date_source(mut self, source: crate::media::DateSource) -> Self {
        for record in self.records.iter_mut().filter(|r| r.status == Status::Error) {
            let mut updated = record.with_date_source(source);
            updated.log(LogLevel::Info, format!("Date source set to {source}"));
            *record = updated;
        }
        self
    }
}

/// Processing statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub processed: AtomicUsize,
    pub unchanged: AtomicUsize,
    pub rotated: AtomicUsize,
    pub failed: AtomicUsize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> String {
        format!(
            "Processed: {}, Unchanged: {}, Rotated: {}, Failed: {}",
            self.processed.load(Ordering::Relaxed),
            self.unchanged.load(Ordering::Relaxed),
            self.rotated.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        )
    }
}

/// Paths and settings shared by every task of one batch
struct BatchContext<'a> {
    input_dir: &'a Path,
    backup_dir: Option<&'a Path>,
    staging_dir: PathBuf,
    jpeg_quality: u8,
}

/// What a finished task did
enum Outcome {
    Written,
    Unchanged,
}

/// Main processor for organizing media files
pub struct Processor {
    config: Config,
}

impl Processor {
    /// Create a new processor with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bounded worker pool; a single worker when parallelism is off
    fn pool(&self, parallel: bool) -> Result<rayon::ThreadPool> {
        let threads = if parallel { self.config.threads } else { 1 };
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("media-sorter-{i}"))
            .build()?)
    }

    /// Scan `input_dir` and resolve dates; writes nothing
    pub fn scan(&self, input_dir: &Path, options: &ScanOptions) -> Result<Vec<MediaRecord>> {
        let _span = span!(Level::INFO, "scan", ?input_dir).entered();

        info!("Scanning input directory...");
        let mut records = scan_directory(input_dir, options.include_videos)?;
        info!(count = records.len(), "Found media files");

        let config = &self.config;
        self.pool(options.parallel)?.install(|| {
            records.par_iter_mut().for_each(|record| {
                extract_metadata(record);
                resolve_with_defaults(record, config.defaults_for(record.media_type));
            });
        });

        if config.burst.assign_on_scan {
            let groups = assign_bursts(&mut records, &config.burst);
            info!(groups = groups.len(), "Assigned burst groups");
        }

        Ok(records)
    }

    /// Scan `input_dir` and organize it into `options.output_dir`
    pub fn process(&self, input_dir: &Path, options: &ProcessOptions) -> Result<ProcessResult> {
        validate_directories(input_dir, &options.output_dir)?;

        let scan_options = ScanOptions {
            include_videos: options.include_videos,
            parallel: options.parallel,
        };
        let records = self.scan(input_dir, &scan_options)?;
        self.process_scanned(input_dir, records, options)
    }

    /// Organize records from an earlier scan, possibly edited by the user
    ///
    /// Bursts are regrouped from the current dates; only pending records are
    /// processed.
    pub fn process_scanned(
        &self,
        input_dir: &Path,
        mut records: Vec<MediaRecord>,
        options: &ProcessOptions,
    ) -> Result<ProcessResult> {
        let _span = span!(Level::INFO, "processor_run").entered();
        validate_directories(input_dir, &options.output_dir)?;

        for record in records.iter_mut() {
            if let Some(ref offset) = options.timezone_offset {
                record.timezone_offset = offset.clone();
            }
            if options.auto_correct_orientation && record.is_photo() {
                record.rotation_mode = RotationMode::Exif;
            }
        }

        let groups = assign_bursts(&mut records, &self.config.burst);
        debug!(groups = groups.len(), "Burst groups before processing");

        let selected: Vec<bool> = records
            .iter()
            .map(|r| r.status == Status::Pending)
            .collect();

        let ctx = BatchContext {
            input_dir,
            backup_dir: options.backup_dir.as_deref(),
            staging_dir: options.output_dir.join(STAGING_DIR_NAME),
            jpeg_quality: self.config.jpeg_quality,
        };

        self.run_batch(&mut records, &selected, &options.output_dir, &ctx, options.parallel)?;

        if options.cleanup_temp {
            cleanup_staging(&ctx.staging_dir);
        }

        Ok(ProcessResult::from_records(records))
    }

    /// Redrive the process phase for the failed records of `command`
    pub fn retry(&self, command: RetryCommand) -> Result<ProcessResult> {
        let _span = span!(Level::INFO, "retry").entered();
        validate_directories(&command.input_dir, &command.output_dir)?;

        let RetryCommand {
            input_dir,
            output_dir,
            backup_dir,
            parallel,
            cleanup_temp,
            mut records,
        } = command;

        let selected: Vec<bool> = records
            .iter()
            .map(|r| r.status == Status::Error)
            .collect();
        let count = selected.iter().filter(|s| **s).count();
        info!(count, "Retrying failed records");

        if count == 0 {
            return Ok(ProcessResult::from_records(records));
        }

        let ctx = BatchContext {
            input_dir: &input_dir,
            backup_dir: backup_dir.as_deref(),
            staging_dir: output_dir.join(STAGING_DIR_NAME),
            jpeg_quality: self.config.jpeg_quality,
        };

        self.run_batch(&mut records, &selected, &output_dir, &ctx, parallel)?;

        if cleanup_temp {
            cleanup_staging(&ctx.staging_dir);
        }

        Ok(ProcessResult::from_records(records))
    }

    /// Plan destinations sequentially, then run one task per selected record
    fn run_batch(
        &self,
        records: &mut [MediaRecord],
        selected: &[bool],
        output_dir: &Path,
        ctx: &BatchContext<'_>,
        parallel: bool,
    ) -> Result<()> {
        plan_destinations(records, selected, output_dir);

        info!("Processing files...");
        let stats = ProcessingStats::new();

        self.pool(parallel)?.install(|| {
            records
                .par_iter_mut()
                .zip(selected.par_iter())
                .filter(|(_, selected)| **selected)
                .for_each(|(record, _)| process_record(record, ctx, &stats));
        });

        info!("{}", stats.summary());
        Ok(())
    }
}

/// Reject an output directory nested inside the input directory
///
/// An output equal to the input is allowed; files are then renamed in place.
pub fn validate_directories(input_dir: &Path, output_dir: &Path) -> Result<()> {
    let input = normalize(input_dir);
    let output = normalize(output_dir);

    if output == input {
        warn!(
            ?input_dir,
            "Output directory is the input directory, files will be organized in place"
        );
        return Ok(());
    }

    if output.starts_with(&input) {
        return Err(Error::DirectoryValidation {
            output: output_dir.to_path_buf(),
            input: input_dir.to_path_buf(),
        });
    }

    Ok(())
}

/// Canonicalize the deepest existing ancestor and re-append the rest
fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut existing = absolute.as_path();
    let mut rest = Vec::new();

    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return rest
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    a == b || (a.exists() && b.exists() && normalize(a) == normalize(b))
}

/// Assign `new_name`/`new_path` to the selected records
///
/// Runs in (resolved time, scan order) so the outcome does not depend on
/// scheduling. A name already claimed in this batch, or present on disk and
/// not the record's own source, gets the first free `_NN` suffix.
fn plan_destinations(records: &mut [MediaRecord], selected: &[bool], output_dir: &Path) {
    let mut claimed: HashSet<PathBuf> = records
        .iter()
        .zip(selected)
        .filter(|(r, s)| !**s && !r.new_path.as_os_str().is_empty())
        .filter(|(r, _)| matches!(r.status, Status::Completed | Status::NoChange))
        .map(|(r, _)| r.new_path.clone())
        .collect();

    let mut order: Vec<usize> = (0..records.len()).filter(|i| selected[*i]).collect();
    order.sort_by_key(|i| records[*i].precise_time());

    let mut conflicts = Vec::new();
    for &i in &order {
        let record = &mut records[i];
        let Some(base) = build_destination(record, output_dir) else {
            record.new_name = unknown_file_name(record);
            record.new_path = output_dir.join(&record.new_name);
            continue;
        };

        let free = !claimed.contains(&base)
            && (!base.exists() || same_file(&base, &record.original_path));
        if free {
            claimed.insert(base.clone());
            set_destination(record, base);
        } else {
            conflicts.push((i, base));
        }
    }

    for (i, base) in conflicts {
        let record = &mut records[i];
        let path = first_free(&base, &claimed);
        record.log(
            LogLevel::Warning,
            format!(
                "Destination {} is taken, using {}",
                base.display(),
                path.display()
            ),
        );
        claimed.insert(path.clone());
        set_destination(record, path);
    }
}

fn set_destination(record: &mut MediaRecord, path: PathBuf) {
    record.new_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    record.new_path = path;
}

/// Run one record through processing; never panics the batch
fn process_record(record: &mut MediaRecord, ctx: &BatchContext<'_>, stats: &ProcessingStats) {
    let _file_span = span!(Level::DEBUG, "process_file", path = ?record.original_path).entered();

    if let Err(e) = record.transition(Status::Processing) {
        warn!(path = ?record.original_path, error = %e, "Record not processable");
        return;
    }
    record.progress = 0;
    record.error_message = None;
    record.rotation_applied = false;
    record.log(LogLevel::Info, "Processing started");

    let outcome = execute(record, ctx);
    let finished = match outcome {
        Ok(Outcome::Written) => {
            info!(
                source = ?record.original_path,
                destination = ?record.new_path,
                date_source = %record.date_source,
                rotated = record.rotation_applied,
                "Processed file"
            );
            let message = format!("Written to {}", record.new_path.display());
            record.log(LogLevel::Info, message);
            stats.processed.fetch_add(1, Ordering::Relaxed);
            if record.rotation_applied {
                stats.rotated.fetch_add(1, Ordering::Relaxed);
            }
            record.transition(Status::Completed)
        }
        Ok(Outcome::Unchanged) => {
            debug!(path = ?record.original_path, "File already in place");
            record.log(LogLevel::Info, "Already at its destination");
            stats.unchanged.fetch_add(1, Ordering::Relaxed);
            record.transition(Status::NoChange)
        }
        Err(e) => {
            error!(path = ?record.original_path, error = %e, "Failed to process file");
            stats.failed.fetch_add(1, Ordering::Relaxed);
            record.fail(e.to_string());
            Ok(())
        }
    };

    if let Err(e) = finished {
        warn!(path = ?record.original_path, error = %e, "Unexpected status transition");
    }
}

fn execute(record: &mut MediaRecord, ctx: &BatchContext<'_>) -> Result<Outcome> {
    if record.date_taken.is_none() {
        return Err(Error::UnknownDate(record.original_path.clone()));
    }

    let degrees = degrees_for(record);
    let dest = record.new_path.clone();
    if degrees == 0 && same_file(&dest, &record.original_path) {
        return Ok(Outcome::Unchanged);
    }

    if let Some(backup_root) = ctx.backup_dir {
        let target = backup_original(record, ctx.input_dir, backup_root)?;
        record.log(LogLevel::Info, format!("Backed up to {}", target.display()));
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(&ctx.staging_dir)?;
    let staging = ctx.staging_dir.join(format!("{}.part", record.new_name));

    let written = if degrees != 0 {
        ImageFormat::from_path(&dest)
            .map_err(|e| Error::Rotation {
                path: record.original_path.clone(),
                message: e.to_string(),
            })
            .and_then(|format| {
                write_rotated(
                    &record.original_path,
                    &staging,
                    format,
                    degrees,
                    &EmbeddedMetadata::from_record(record),
                    ctx.jpeg_quality,
                )
            })
    } else {
        copy_file(&record.original_path, &staging)
    };

    if let Err(e) = written.and_then(|_| commit(&staging, &dest)) {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    preserve_mtime(&record.original_path, &dest);

    if degrees != 0 {
        record.rotation_applied = true;
        record.log(LogLevel::Info, format!("Rotated {degrees} degrees"));
    }
    Ok(Outcome::Written)
}

/// Copy the original below `backup_root`, mirroring its place under the input
fn backup_original(record: &MediaRecord, input_dir: &Path, backup_root: &Path) -> Result<PathBuf> {
    let relative = record
        .original_path
        .strip_prefix(input_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(&record.file_name));
    let target = backup_root.join(relative);

    // A retry finds the backup of the first attempt
    if let Ok(metadata) = fs::metadata(&target)
        && metadata.len() == record.file_size
    {
        return Ok(target);
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    copy_file(&record.original_path, &target)?;
    preserve_mtime(&record.original_path, &target);
    Ok(target)
}

/// Move a finished staging file to its destination
fn commit(staging: &Path, dest: &Path) -> Result<()> {
    // Try rename first (same filesystem)
    if fs::rename(staging, dest).is_err() {
        copy_file(staging, dest)?;
        fs::remove_file(staging)?;
    }
    Ok(())
}

fn cleanup_staging(staging_dir: &Path) {
    match fs::remove_dir_all(staging_dir) {
        Ok(()) => debug!(?staging_dir, "Removed staging directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?staging_dir, error = %e, "Failed to remove staging directory"),
    }
}

fn preserve_mtime(source: &Path, dest: &Path) {
    if let Ok(metadata) = fs::metadata(source)
        && let Ok(mtime) = metadata.modified()
    {
        let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime));
    }
}

/// Copy file with buffered I/O
fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let write_error = |e: std::io::Error| Error::Write {
        path: dest.to_path_buf(),
        message: e.to_string(),
    };

    let src_file = File::open(source)?;
    let dest_file = File::create(dest).map_err(write_error)?;

    let mut reader = BufReader::with_capacity(256 * 1024, src_file);
    let mut writer = BufWriter::with_capacity(256 * 1024, dest_file);

    let mut buffer = vec![0u8; 256 * 1024];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read]).map_err(write_error)?;
    }

    writer.flush().map_err(write_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::DateSource;
    use crate::orientation::tests::write_test_jpeg;
    use chrono::NaiveDateTime;

    fn exif_meta(s: &str) -> EmbeddedMetadata {
        EmbeddedMetadata {
            date: NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok(),
            ..Default::default()
        }
    }

    fn processor() -> Processor {
        Processor::new(Config::default()).unwrap()
    }

    fn by_name<'a>(result: &'a ProcessResult, name: &str) -> &'a MediaRecord {
        result.media.iter().find(|r| r.file_name == name).unwrap()
    }

    #[test]
    fn test_processing_stats() {
        let stats = ProcessingStats::new();
        stats.processed.fetch_add(5, Ordering::Relaxed);
        stats.unchanged.fetch_add(2, Ordering::Relaxed);
        stats.failed.fetch_add(1, Ordering::Relaxed);

        let summary = stats.summary();
        assert!(summary.contains("Processed: 5"));
        assert!(summary.contains("Unchanged: 2"));
        assert!(summary.contains("Failed: 1"));
    }

    #[test]
    fn test_burst_end_to_end() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        for (name, time) in [
            ("a.jpg", "2025-01-15 10:30:00"),
            ("b.jpg", "2025-01-15 10:30:01"),
            ("c.jpg", "2025-01-15 10:30:02"),
        ] {
            write_test_jpeg(&input.path().join(name), 4, 2, None, &exif_meta(time));
        }

        let options = ProcessOptions::new(output.path());
        let result = processor().process(input.path(), &options).unwrap();

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.total_files, 3);
        assert_eq!(result.processed_files, 3);

        let day_dir = output.path().join("2025/2025-01/2025-01-15");
        for (name, expected) in [
            ("a.jpg", "2025-01-15_10-30-00_01.jpg"),
            ("b.jpg", "2025-01-15_10-30-01_02.jpg"),
            ("c.jpg", "2025-01-15_10-30-02_03.jpg"),
        ] {
            let record = by_name(&result, name);
            assert_eq!(record.status, Status::Completed);
            assert_eq!(record.date_source, DateSource::Exif);
            assert_eq!(record.burst_group_id, Some(1));
            assert_eq!(record.new_name, expected);
            assert_eq!(record.new_path, day_dir.join(expected));
            assert_eq!(record.progress, 100);
            assert!(record.new_path.is_file());
        }
        assert!(!output.path().join(STAGING_DIR_NAME).exists());
    }

    #[test]
    fn test_filename_date_end_to_end() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_test_jpeg(
            &input.path().join("IMG_20250101_120000.jpg"),
            4,
            2,
            None,
            &EmbeddedMetadata::default(),
        );

        let result = processor()
            .process(input.path(), &ProcessOptions::new(output.path()))
            .unwrap();

        let record = &result.media[0];
        assert_eq!(record.date_source, DateSource::FileName);
        assert_eq!(
            record.date_taken.unwrap().format("%Y-%m-%dT%H:%M:%S").to_string(),
            "2025-01-01T12:00:00"
        );
        assert_eq!(record.new_name, "2025-01-01_12-00-00.jpg");
        assert!(!record.is_burst());
        assert_eq!(
            fs::read(&record.new_path).unwrap(),
            fs::read(&record.original_path).unwrap()
        );
    }

    #[test]
    fn test_output_inside_input_is_fatal() {
        let input = tempfile::tempdir().unwrap();
        let nested = input.path().join("sorted");
        let result = processor().process(input.path(), &ProcessOptions::new(&nested));
        assert!(matches!(result, Err(Error::DirectoryValidation { .. })));
        assert!(!nested.exists());
    }

    #[test]
    fn test_in_place_file_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let placed = dir.path().join("2025/2025-01/2025-01-01");
        fs::create_dir_all(&placed).unwrap();
        write_test_jpeg(
            &placed.join("2025-01-01_12-00-00.jpg"),
            4,
            2,
            None,
            &EmbeddedMetadata::default(),
        );

        let result = processor()
            .process(dir.path(), &ProcessOptions::new(dir.path()))
            .unwrap();

        assert_eq!(result.media[0].status, Status::NoChange);
        assert_eq!(result.processed_files, 1);
        assert!(result.success);
    }

    #[test]
    fn test_same_second_collision_gets_suffix() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        for sub in ["a", "b"] {
            let dir = input.path().join(sub);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("IMG_20250101_120000.jpg"), sub.as_bytes()).unwrap();
        }

        let result = processor()
            .process(input.path(), &ProcessOptions::new(output.path()))
            .unwrap();

        assert!(result.success);
        let names: Vec<&str> = result.media.iter().map(|r| r.new_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["2025-01-01_12-00-00.jpg", "2025-01-01_12-00-00_01.jpg"]
        );
        assert_eq!(fs::read(&result.media[1].new_path).unwrap(), b"b");
    }

    #[test]
    fn test_existing_destination_is_not_overwritten() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("IMG_20250101_120000.jpg"), b"new").unwrap();
        let taken = output.path().join("2025/2025-01/2025-01-01/2025-01-01_12-00-00.jpg");
        fs::create_dir_all(taken.parent().unwrap()).unwrap();
        fs::write(&taken, b"old").unwrap();

        let result = processor()
            .process(input.path(), &ProcessOptions::new(output.path()))
            .unwrap();

        assert_eq!(result.media[0].new_name, "2025-01-01_12-00-00_01.jpg");
        assert_eq!(fs::read(&taken).unwrap(), b"old");
    }

    #[test]
    fn test_unknown_date_then_retry() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("IMG_20250101_120000.jpg"), b"one").unwrap();
        fs::write(input.path().join("holiday.jpg"), b"two").unwrap();

        let p = processor();
        let records: Vec<MediaRecord> = p
            .scan(input.path(), &ScanOptions::default())
            .unwrap()
            .into_iter()
            .map(|r| {
                if r.file_name == "holiday.jpg" {
                    r.with_date_source(DateSource::None)
                } else {
                    r
                }
            })
            .collect();

        let options = ProcessOptions::new(output.path());
        let first = p.process_scanned(input.path(), records, &options).unwrap();

        assert!(!first.success);
        assert_eq!(
            first.errors,
            vec![format!(
                "{}: No date candidate available",
                input.path().join("holiday.jpg").display()
            )]
        );
        let failed = by_name(&first, "holiday.jpg");
        assert_eq!(failed.status, Status::Error);
        assert_eq!(failed.new_name, "unknown_date.jpg");
        assert!(!failed.new_path.exists());

        let done = by_name(&first, "IMG_20250101_120000.jpg").clone();
        assert_eq!(done.status, Status::Completed);
        let done_logs = done.logs.len();

        let command = RetryCommand::new(input.path(), &options, first.media)
            .with_date_source(DateSource::FileModified);
        assert_eq!(command.failed_count(), 1);
        let second = p.retry(command).unwrap();

        assert!(second.success, "{:?}", second.errors);
        assert_eq!(second.processed_files, 2);
        let retried = by_name(&second, "holiday.jpg");
        assert_eq!(retried.status, Status::Completed);
        assert_eq!(retried.date_source, DateSource::FileModified);
        assert_eq!(fs::read(&retried.new_path).unwrap(), b"two");

        let untouched = by_name(&second, "IMG_20250101_120000.jpg");
        assert_eq!(untouched.new_path, done.new_path);
        assert_eq!(untouched.status, Status::Completed);
        assert_eq!(untouched.logs.len(), done_logs);
        assert_eq!(fs::read(&untouched.new_path).unwrap(), b"one");
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("IMG_20250101_120000.jpg"), b"not an image").unwrap();
        write_test_jpeg(
            &input.path().join("IMG_20250102_120000.jpg"),
            6,
            2,
            None,
            &EmbeddedMetadata::default(),
        );

        let mut config = Config::default();
        config.photo.rotation_mode = RotationMode::Deg90;
        let p = Processor::new(config).unwrap();
        let options = ProcessOptions::new(output.path());
        let result = p.process(input.path(), &options).unwrap();

        assert_eq!(result.total_files, 2);
        assert_eq!(result.processed_files, 1);
        assert_eq!(result.errors.len(), 1);

        let broken = by_name(&result, "IMG_20250101_120000.jpg");
        assert_eq!(broken.status, Status::Error);
        assert!(!broken.rotation_applied);
        assert!(!broken.new_path.exists());

        let good = by_name(&result, "IMG_20250102_120000.jpg");
        assert_eq!(good.status, Status::Completed);
        assert!(good.rotation_applied);
        assert_eq!(image::image_dimensions(&good.new_path).unwrap(), (2, 6));

        // Retrying leaves the completed record alone and fails again
        let before = fs::read(&good.new_path).unwrap();
        let again = p
            .retry(RetryCommand::new(input.path(), &options, result.media.clone()))
            .unwrap();
        assert_eq!(by_name(&again, "IMG_20250101_120000.jpg").status, Status::Error);
        assert_eq!(fs::read(&by_name(&again, "IMG_20250102_120000.jpg").new_path).unwrap(), before);
    }

    #[test]
    fn test_orientation_correction_is_idempotent() {
        let input = tempfile::tempdir().unwrap();
        let first_out = tempfile::tempdir().unwrap();
        let second_out = tempfile::tempdir().unwrap();
        write_test_jpeg(
            &input.path().join("portrait.jpg"),
            8,
            4,
            Some(6),
            &exif_meta("2025-01-15 10:30:00"),
        );

        let mut options = ProcessOptions::new(first_out.path());
        options.auto_correct_orientation = true;
        let first = processor().process(input.path(), &options).unwrap();
        let rotated = &first.media[0];
        assert!(rotated.rotation_applied);
        assert_eq!(image::image_dimensions(&rotated.new_path).unwrap(), (4, 8));

        options.output_dir = second_out.path().to_path_buf();
        let second = processor().process(first_out.path(), &options).unwrap();
        let again = &second.media[0];
        assert_eq!(again.exif_orientation, Some(1));
        assert_eq!(again.date_source, DateSource::Exif);
        assert!(!again.rotation_applied);
        assert_eq!(again.new_name, "2025-01-15_10-30-00.jpg");
        assert_eq!(image::image_dimensions(&again.new_path).unwrap(), (4, 8));
        assert_eq!(
            fs::read(&again.new_path).unwrap(),
            fs::read(&rotated.new_path).unwrap()
        );
    }

    #[test]
    fn test_backup_and_staging_kept() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let backup = tempfile::tempdir().unwrap();
        fs::create_dir_all(input.path().join("trip")).unwrap();
        fs::write(input.path().join("trip/IMG_20250101_120000.jpg"), b"data").unwrap();

        let mut options = ProcessOptions::new(output.path());
        options.backup_dir = Some(backup.path().to_path_buf());
        options.cleanup_temp = false;
        let result = processor().process(input.path(), &options).unwrap();

        assert!(result.success);
        assert_eq!(
            fs::read(backup.path().join("trip/IMG_20250101_120000.jpg")).unwrap(),
            b"data"
        );
        let staging = output.path().join(STAGING_DIR_NAME);
        assert!(staging.is_dir());
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let input = tempfile::tempdir().unwrap();
        for i in 0..6 {
            fs::write(
                input.path().join(format!("IMG_20250101_12000{i}.jpg")),
                [i as u8],
            )
            .unwrap();
        }

        let p = processor();
        let parallel = p.scan(input.path(), &ScanOptions::default()).unwrap();
        let sequential = p
            .scan(
                input.path(),
                &ScanOptions {
                    include_videos: false,
                    parallel: false,
                },
            )
            .unwrap();

        let key = |records: &[MediaRecord]| -> Vec<(String, Option<u32>, Option<u32>)> {
            records
                .iter()
                .map(|r| (r.file_name.clone(), r.burst_group_id, r.burst_index))
                .collect()
        };
        assert_eq!(key(&parallel), key(&sequential));
        assert!(parallel.iter().all(|r| r.burst_group_id == Some(1)));
    }

    #[test]
    fn test_timezone_override() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("IMG_20241231_200000.jpg"), b"x").unwrap();

        let mut options = ProcessOptions::new(output.path());
        options.timezone_offset = Some("+09:00".parse().unwrap());
        let result = processor().process(input.path(), &options).unwrap();

        let record = &result.media[0];
        assert_eq!(record.new_name, "2025-01-01_05-00-00.jpg");
        assert_eq!(
            record.new_path,
            output.path().join("2025/2025-01/2025-01-01/2025-01-01_05-00-00.jpg")
        );
    }
}

//! Run report persistence
//!
//! A finished run is written as JSON next to its output so a later
//! invocation can retry the records that failed without rescanning.

use crate::error::{Error, Result};
use crate::process::{ProcessOptions, ProcessResult, RetryCommand};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Report file name inside the output directory
pub const REPORT_FILENAME: &str = ".media-sorter-report.json";

/// Outcome of one run plus what is needed to replay it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Version for report file format compatibility
    version: u32,

    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub backup_dir: Option<PathBuf>,
    pub parallel: bool,
    pub cleanup_temp: bool,

    /// When the report was last written
    pub updated_at: chrono::DateTime<chrono::Utc>,

    pub result: ProcessResult,
}

impl RunReport {
    /// Current report file format version
    const VERSION: u32 = 1;

    pub fn new(input_dir: &Path, options: &ProcessOptions, result: ProcessResult) -> Self {
        Self {
            version: Self::VERSION,
            input_dir: input_dir.to_path_buf(),
            output_dir: options.output_dir.clone(),
            backup_dir: options.backup_dir.clone(),
            parallel: options.parallel,
            cleanup_temp: options.cleanup_temp,
            updated_at: chrono::Utc::now(),
            result,
        }
    }

    /// Default report location for an output directory
    pub fn default_path(output_dir: &Path) -> PathBuf {
        output_dir.join(REPORT_FILENAME)
    }

    /// Load a report from file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Report(format!("Failed to open {}: {}", path.display(), e)))?;
        let reader = BufReader::new(file);

        let report: Self = serde_json::from_reader(reader)
            .map_err(|e| Error::Report(format!("Failed to parse {}: {}", path.display(), e)))?;

        if report.version != Self::VERSION {
            return Err(Error::Report(format!(
                "Unsupported report version {} (expected {})",
                report.version,
                Self::VERSION
            )));
        }

        info!(
            records = report.result.total_files,
            failed = report.result.failed_count(),
            "Loaded run report"
        );

        Ok(report)
    }

    /// Save report to file
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at = chrono::Utc::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a temporary file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");

        let file = File::create(&temp_path)
            .map_err(|e| Error::Report(format!("Failed to create temp report file: {}", e)))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| Error::Report(format!("Failed to write report file: {}", e)))?;

        fs::rename(&temp_path, path)
            .map_err(|e| Error::Report(format!("Failed to rename temp report file: {}", e)))?;

        debug!(?path, "Saved run report");
        Ok(())
    }

    /// Replace the stored result after a retry
    pub fn update(&mut self, result: ProcessResult) {
        self.result = result;
    }

    /// Retry command over the stored records
    pub fn to_retry(&self) -> RetryCommand {
        RetryCommand {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            backup_dir: self.backup_dir.clone(),
            parallel: self.parallel,
            cleanup_temp: self.cleanup_temp,
            records: self.result.media.clone(),
        }
    }
}

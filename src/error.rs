//! Error types for the media sorter

use crate::media::Status;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media sorter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media sorter
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Failed to write EXIF data: {0}")]
    ExifWrite(String),

    #[error("Failed to rotate {path}: {message}")]
    Rotation { path: PathBuf, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("No date candidate available")]
    UnknownDate(PathBuf),

    #[error("Output directory {output} is inside input directory {input}")]
    DirectoryValidation { output: PathBuf, input: PathBuf },

    #[error("Input directory does not exist: {0}")]
    InputNotFound(PathBuf),

    #[error("Invalid timezone offset '{0}', expected none, exif or ±HH:MM")]
    InvalidOffset(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("Report file error: {0}")]
    Report(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

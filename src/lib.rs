//! Media Sorter - Photo and video organization engine
//!
//! Renames and files media by capture date with support for:
//! - EXIF, filename and file system date candidates with priority resolution
//! - Timezone correction from EXIF or an explicit offset
//! - Burst grouping of rapid-fire photos
//! - Orientation correction that leaves a normalized EXIF tag
//! - Parallel processing with Rayon and retry of failed files

pub mod burst;
pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod naming;
pub mod orientation;
pub mod os;
pub mod process;
pub mod scan;
pub mod state;
pub mod time;

pub use cli::Cli;
pub use config::{BurstConfig, Config, ConfigError, MediaDefaults};
pub use error::{Error, Result};
pub use media::{DateSource, LogEntry, LogLevel, MediaRecord, MediaType, RotationMode, Status};
pub use os::reveal_in_file_manager;
pub use process::{ProcessOptions, ProcessResult, Processor, RetryCommand, ScanOptions};
pub use state::RunReport;
pub use time::offset::TimezoneOffset;

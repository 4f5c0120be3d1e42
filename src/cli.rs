//! CLI argument parsing with clap

use crate::config::Config;
use crate::media::DateSource;
use crate::process::{ProcessOptions, ScanOptions};
use crate::time::offset::TimezoneOffset;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Media Sorter - Photo and video organization tool
///
/// Renames and files your photos and videos by capture date, grouping
/// bursts and correcting orientation along the way.
#[derive(Parser, Debug)]
#[command(name = "media-sorter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads for parallel processing (0 = auto)
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long, global = true)]
    pub json_log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a directory and show the resolved dates without writing anything
    Scan(ScanArgs),
    /// Organize a directory into a dated output tree
    Process(ProcessArgs),
    /// Retry the failed records of an earlier run
    Retry(RetryArgs),
    /// Show a file in the system file manager
    Reveal {
        /// File or directory to reveal
        path: PathBuf,
    },
    /// Write a sample configuration file
    InitConfig {
        /// Destination of the configuration file
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Input directory to scan for media files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Include video files
    #[arg(long)]
    pub videos: bool,

    /// Extract metadata on a single thread
    #[arg(long)]
    pub sequential: bool,

    /// Print the scanned records as JSON
    #[arg(long)]
    pub json: bool,
}

impl ScanArgs {
    pub fn to_options(&self) -> ScanOptions {
        ScanOptions {
            include_videos: self.videos,
            parallel: !self.sequential,
        }
    }
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Input directory to scan for media files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for organized files
    #[arg(short, long)]
    pub output: PathBuf,

    /// Copy every original here before writing
    #[arg(long)]
    pub backup: Option<PathBuf>,

    /// Include video files
    #[arg(long)]
    pub videos: bool,

    /// Process files on a single thread
    #[arg(long)]
    pub sequential: bool,

    /// Timezone correction: none, exif, or an offset such as +09:00
    #[arg(long, allow_hyphen_values = true)]
    pub timezone: Option<TimezoneOffset>,

    /// Keep the staging directory after the run
    #[arg(long)]
    pub keep_temp: bool,

    /// Rotate photos according to their EXIF orientation
    #[arg(long)]
    pub auto_orient: bool,

    /// Do not write a run report
    #[arg(long)]
    pub no_report: bool,
}

impl ProcessArgs {
    pub fn to_options(&self) -> ProcessOptions {
        ProcessOptions {
            output_dir: self.output.clone(),
            backup_dir: self.backup.clone(),
            include_videos: self.videos,
            parallel: !self.sequential,
            timezone_offset: self.timezone.clone(),
            cleanup_temp: !self.keep_temp,
            auto_correct_orientation: self.auto_orient,
        }
    }
}

#[derive(Args, Debug)]
pub struct RetryArgs {
    /// Run report written by an earlier `process`
    #[arg(long)]
    pub report: PathBuf,

    /// Resolve failed records from this date source instead
    #[arg(long, value_enum)]
    pub date_source: Option<DateSource>,

    /// Retry on a single thread
    #[arg(long)]
    pub sequential: bool,
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Subcommand name used in log file names
    pub fn command_name(&self) -> &'static str {
        match self.command {
            Command::Scan(_) => "Scan",
            Command::Process(_) => "Process",
            Command::Retry(_) => "Retry",
            Command::Reveal { .. } => "Reveal",
            Command::InitConfig { .. } => "InitConfig",
        }
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from([
            "media-sorter",
            "-t",
            "4",
            "process",
            "-i",
            "in",
            "-o",
            "out",
            "--timezone",
            "-05:00",
            "--keep-temp",
            "--auto-orient",
        ])
        .unwrap();

        assert_eq!(cli.command_name(), "Process");
        assert_eq!(cli.merge_with_config(Config::default()).threads, 4);

        let Command::Process(args) = cli.command else {
            panic!("expected process");
        };
        let options = args.to_options();
        assert_eq!(options.output_dir, PathBuf::from("out"));
        assert_eq!(
            options.timezone_offset,
            Some(TimezoneOffset::Explicit("-05:00".into()))
        );
        assert!(!options.cleanup_temp);
        assert!(options.auto_correct_orientation);
        assert!(options.parallel);
    }

    #[test]
    fn test_parse_rejects_bad_timezone() {
        let result = Cli::try_parse_from([
            "media-sorter",
            "process",
            "-i",
            "in",
            "-o",
            "out",
            "--timezone",
            "+25:00",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_retry_and_scan() {
        let cli = Cli::try_parse_from([
            "media-sorter",
            "retry",
            "--report",
            "r.json",
            "--date-source",
            "file_modified",
        ])
        .unwrap();
        let Command::Retry(args) = cli.command else {
            panic!("expected retry");
        };
        assert_eq!(args.date_source, Some(DateSource::FileModified));

        let cli = Cli::try_parse_from(["media-sorter", "scan", "-i", "in", "--sequential"]).unwrap();
        let Command::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert!(!args.to_options().parallel);
    }
}

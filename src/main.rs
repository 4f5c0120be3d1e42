//! Media Sorter - Photo and video organization tool
//!
//! A CLI front end over the media-sorter library: scan, process, retry
//! and reveal.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use media_sorter::cli::{Command, ProcessArgs, RetryArgs, ScanArgs};
use media_sorter::media::{MediaRecord, Status};
use media_sorter::{Cli, Config, ProcessResult, Processor, RunReport, reveal_in_file_manager};
use std::path::{Path, PathBuf};
use tracing::{Level, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// CLI Output Module
mod cli_output {
    //! Colored terminal output for command summaries

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    /// CLI theme colors
    pub struct CliTheme;

    impl CliTheme {
        /// Success color (green)
        pub const SUCCESS: Color = Color::Green;
        /// Warning color (yellow)
        pub const WARNING: Color = Color::Yellow;
        /// Error color (red)
        pub const ERROR: Color = Color::Red;
        /// Hint color (dark grey)
        pub const HINT: Color = Color::DarkGrey;
        /// Accent color (cyan)
        pub const ACCENT: Color = Color::Cyan;
    }

    /// Print a separator line
    pub fn print_separator() {
        let _ = stdout().execute(Print(format!("{}\n", "─".repeat(60))));
    }

    /// Print a centered title
    pub fn print_title(title: &str) {
        let width: usize = 60;
        let padding = width.saturating_sub(title.len()) / 2;
        let left_pad = " ".repeat(padding.saturating_sub(1));

        let _ = stdout().execute(Print(format!(
            "{}{} {}{}\n",
            left_pad,
            "╔".bold(),
            title.bold(),
            "╗".bold(),
        )));
        let _ = stdout().execute(Print("\n"));
    }

    /// Print a warning message
    pub fn print_warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(CliTheme::WARNING).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    /// Print an error message
    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    /// Print a hint message
    pub fn print_hint(msg: &str) {
        let _ = stdout().execute(Print(style("→ ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    /// Print a key-value pair
    pub fn print_key_value(key: &str, value: &str, value_color: Option<Color>) {
        let key_styled = style(key).with(CliTheme::HINT);
        let value_styled = match value_color {
            Some(color) => style(value).with(color),
            None => style(value).bold(),
        };
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(key_styled));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(value_styled));
        let _ = stdout().execute(Print("\n"));
    }

    /// Print a statistic
    pub fn print_stat(key: &str, value: &str, color: Color) {
        print_key_value(key, value, Some(color));
    }

    /// Print one record line: icon, source, then destination or message
    pub fn print_result(status_icon: &str, status_color: Color, source: &str, dest_or_msg: &str) {
        let icon_styled = style(status_icon).with(status_color).bold();
        let source_styled = style(source).italic();
        let msg_styled = style(dest_or_msg).with(CliTheme::HINT);

        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(icon_styled));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(source_styled));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(msg_styled));
        let _ = stdout().execute(Print("\n"));
    }

    /// Print the log file path
    pub fn print_log_path(path: &str) {
        let _ = stdout().execute(Print("\n"));
        let _ = stdout().execute(Print(style("  📁 ").with(CliTheme::ACCENT)));
        let _ = stdout().execute(Print(style("Log file: ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", path)));
    }

    /// Print an empty line
    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!(error = %e, "Command failed");
        cli_output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Get the executable directory for Config and Log directories
    let exe_dir = get_executable_dir()?;
    let log_path = get_log_path(&exe_dir, &cli);
    let _guard = setup_logging(&cli, &log_path)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = cli.command_name(),
        "Media Sorter starting"
    );

    let config = load_config(&cli, &exe_dir)?;
    if cli.verbose {
        info!(?config, "Configuration loaded");
    }

    match &cli.command {
        Command::Scan(args) => run_scan(&cli, config, args)?,
        Command::Process(args) => run_process(&cli, config, args)?,
        Command::Retry(args) => run_retry(&cli, config, args)?,
        Command::Reveal { path } => reveal_in_file_manager(path)?,
        Command::InitConfig { path } => {
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, Config::sample_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            cli_output::print_hint(&format!("Sample configuration written to {}", path.display()));
            return Ok(());
        }
    }

    if !matches!(cli.command, Command::Reveal { .. }) {
        cli_output::print_separator();
        cli_output::print_log_path(&log_path.display().to_string());
    }
    Ok(())
}

fn run_scan(cli: &Cli, config: Config, args: &ScanArgs) -> Result<()> {
    use cli_output::*;

    let processor = Processor::new(config)?;
    let records = processor.scan(&args.input, &args.to_options())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    print_separator();
    print_title("Scan Results");
    print_separator();

    for record in &records {
        let detail = match record.date_taken {
            Some(date) => {
                let mut detail = format!("{} ({})", date.format("%Y-%m-%d %H:%M:%S"), record.date_source);
                if let (Some(group), Some(index)) = (record.burst_group_id, record.burst_index) {
                    detail.push_str(&format!(" burst {group}#{index}"));
                }
                detail
            }
            None => "no date".to_string(),
        };
        let color = if record.date_taken.is_some() {
            CliTheme::SUCCESS
        } else {
            CliTheme::WARNING
        };
        print_result("•", color, &display_source(cli, record), &detail);
    }

    let undated = records.iter().filter(|r| r.date_taken.is_none()).count();
    let bursts = records
        .iter()
        .filter_map(|r| r.burst_group_id)
        .max()
        .unwrap_or(0);

    print_blank();
    print_stat("Files", &records.len().to_string(), CliTheme::ACCENT);
    print_stat("Burst groups", &bursts.to_string(), CliTheme::ACCENT);
    print_stat("Without date", &undated.to_string(), CliTheme::WARNING);
    Ok(())
}

fn run_process(cli: &Cli, config: Config, args: &ProcessArgs) -> Result<()> {
    let processor = Processor::new(config)?;
    let options = args.to_options();

    let result = processor.process(&args.input, &options)?;

    if !args.no_report {
        let path = RunReport::default_path(&options.output_dir);
        let mut report = RunReport::new(&args.input, &options, result.clone());
        report.save(&path)?;
        info!(report = %path.display(), "Run report saved");
    }

    print_summary(cli, "Processing Complete", &result);

    if !result.success && !args.no_report {
        cli_output::print_hint(&format!(
            "Retry failed files with: media-sorter retry --report {}",
            RunReport::default_path(&options.output_dir).display()
        ));
    }
    Ok(())
}

fn run_retry(cli: &Cli, config: Config, args: &RetryArgs) -> Result<()> {
    let processor = Processor::new(config)?;
    let mut report = RunReport::load(&args.report)?;

    let mut command = report.to_retry();
    if args.sequential {
        command.parallel = false;
    }
    if let Some(source) = args.date_source {
        command = command.with_date_source(source);
    }

    if command.failed_count() == 0 {
        cli_output::print_hint("Nothing to retry");
        return Ok(());
    }

    let result = processor.retry(command)?;
    report.update(result.clone());
    report.save(&args.report)?;

    print_summary(cli, "Retry Complete", &result);
    Ok(())
}

fn print_summary(cli: &Cli, title: &str, result: &ProcessResult) {
    use cli_output::*;

    let count = |status: Status| result.media.iter().filter(|r| r.status == status).count();

    print_separator();
    print_title(title);
    print_separator();

    print_blank();
    print_stat("Total", &result.total_files.to_string(), CliTheme::ACCENT);
    print_stat("Written", &count(Status::Completed).to_string(), CliTheme::SUCCESS);
    print_stat("Unchanged", &count(Status::NoChange).to_string(), CliTheme::WARNING);
    print_stat(
        "Rotated",
        &result.media.iter().filter(|r| r.rotation_applied).count().to_string(),
        CliTheme::ACCENT,
    );
    print_stat("Failed", &result.failed_count().to_string(), CliTheme::ERROR);
    print_blank();

    // Print detailed results if verbose
    if cli.verbose {
        print_separator();
        print_hint("Detailed results:");
        print_blank();

        for record in &result.media {
            let source = display_source(cli, record);
            match record.status {
                Status::Completed => print_result(
                    "✓",
                    CliTheme::SUCCESS,
                    &source,
                    &format!("→ {}", record.new_path.display()),
                ),
                Status::NoChange => print_result("⊘", CliTheme::WARNING, &source, "already in place"),
                Status::Error => print_result(
                    "✗",
                    CliTheme::ERROR,
                    &source,
                    record.error_message.as_deref().unwrap_or("unknown error"),
                ),
                Status::Pending | Status::Processing => {
                    print_result("~", CliTheme::HINT, &source, &record.status.to_string())
                }
            }
        }
    }

    if !result.errors.is_empty() {
        print_separator();
        print_error(&format!("Failed: {} files", result.errors.len()));
        print_blank();
        for record in result.media.iter().filter(|r| r.status == Status::Error) {
            print_key_value(
                &display_source(cli, record),
                record.error_message.as_deref().unwrap_or("unknown error"),
                Some(CliTheme::ERROR),
            );
        }
    } else if result.total_files == 0 {
        print_warning("No media files found");
    }
}

fn display_source(cli: &Cli, record: &MediaRecord) -> String {
    if cli.verbose {
        record.original_path.display().to_string()
    } else {
        record.file_name.clone()
    }
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Determine the log file path based on config file or command
fn get_log_path(exe_dir: &Path, cli: &Cli) -> PathBuf {
    let log_dir = exe_dir.join("Log");
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    if let Some(config_name) = cli.config_name() {
        let config_log_dir = log_dir.join(&config_name);
        let log_filename = format!("{}_{}.log", config_name, timestamp);
        config_log_dir.join(log_filename)
    } else {
        let log_filename = format!("{}_{}.log", cli.command_name(), timestamp);
        log_dir.join(log_filename)
    }
}

/// Resolve config path - supports shorthand syntax
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let config_dir = exe_dir.join("Config");
    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());

    let mut in_config_dir = config_dir.join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file, then apply CLI overrides
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        let resolved_path = resolve_config_path(exe_dir, config_path);
        info!(config_file = %resolved_path.display(), "Loading configuration from file");
        Config::load_from_file(&resolved_path)?
    } else {
        Config::default()
    };

    Ok(cli.merge_with_config(config))
}

/// Setup logging (file + console)
fn setup_logging(cli: &Cli, log_path: &Path) -> Result<WorkerGuard> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(guard)
}

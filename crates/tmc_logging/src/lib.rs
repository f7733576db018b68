//! Shared logging utilities for tmc binaries.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "tmc=info,tmc_features=info";
const MAX_LOG_FILES: usize = 5;

/// Logging configuration shared by tmc binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter on stderr instead of warnings only
    pub verbose: bool,
    /// Override for the log directory; defaults to [`logs_dir`]
    pub log_dir: Option<PathBuf>,
}

/// Keeps the background file writer alive. Dropping it flushes pending lines.
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Initialize tracing with a daily-rolled log file and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let log_dir = match config.log_dir {
        Some(dir) => {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
            dir
        }
        None => ensure_logs_dir().context("Failed to ensure log directory")?,
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(sanitize_name(config.app_name))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(&log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_filter = default_filter();
    let console_filter = console_filter(config.verbose);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: guard })
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn console_filter(verbose: bool) -> EnvFilter {
    if verbose {
        default_filter()
    } else {
        EnvFilter::new("warn")
    }
}

/// Get the tmc home directory.
///
/// Priority:
/// 1) TMC_HOME
/// 2) ~/.tmc
/// 3) ./.tmc
pub fn tmc_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("TMC_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .map(|home| home.join(".tmc"))
        .unwrap_or_else(|| PathBuf::from(".").join(".tmc"))
}

/// Get the logs directory: <home>/logs
pub fn logs_dir() -> PathBuf {
    tmc_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

//! File logging for the `ticket-desk` binary.
//!
//! Every invocation gets its own file under the local data directory. Files
//! are opened in append mode so that two runs resolving the same name never
//! erase each other's output.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::Local;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_LEVEL_ENV: &str = "TICKET_DESK_LOG_LEVEL";
const DEFAULT_LOG_LEVEL: &str = "warn";
const APP_DIR: &str = "ticket-desk";

pub fn init_logging() -> anyhow::Result<PathBuf> {
    let log_dir = get_log_directory()?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory '{}'", log_dir.display()))?;

    let log_file_path = get_log_file_path(&log_dir);
    let file = open_log_file(&log_file_path)
        .with_context(|| format!("failed to open log file '{}'", log_file_path.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // The writer must outlive every span of the process.
    std::mem::forget(guard);

    tracing_subscriber::registry()
        .with(log_filter(std::env::var(LOG_LEVEL_ENV).ok().as_deref()))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(
        pid = std::process::id(),
        path = %log_file_path.display(),
        "logging initialized"
    );
    Ok(log_file_path)
}

fn log_filter(raw_level: Option<&str>) -> EnvFilter {
    let level = raw_level
        .and_then(normalize_log_level)
        .unwrap_or(DEFAULT_LOG_LEVEL);
    EnvFilter::new(format!("{level},ticket_desk={level}"))
}

fn normalize_log_level(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

pub fn get_log_directory() -> anyhow::Result<PathBuf> {
    let data_dir =
        dirs::data_local_dir().ok_or_else(|| anyhow!("failed to determine local data directory"))?;
    Ok(data_dir.join(APP_DIR).join("logs"))
}

/// `ticket-desk-<local time with millis>-<pid>.log`
pub fn get_log_file_path(log_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S%.3f");
    log_dir.join(format!("{APP_DIR}-{timestamp}-{}.log", std::process::id()))
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

pub fn print_log_location(log_path: &Path) {
    eprintln!("log file: {}", log_path.display());
}

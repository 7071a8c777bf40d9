//! Tracing subscriber setup

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::expand_tilde;
use crate::config::schema::LoggingConfig;

const LOG_FILE_PREFIX: &str = "parley.log";

/// Where log lines go besides the rolling file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// File and stdout
    Console,
    /// File only; used while the terminal UI owns the screen
    FileOnly,
}

/// Initialize the logging system.
///
/// The returned guard must be held for as long as logs should be flushed.
pub fn init_logging(config: &LoggingConfig, output: LogOutput) -> crate::Result<WorkerGuard> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.level.clone());
    let filter = build_filter(&log_level, config);

    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.format.clone());
    let is_json = format.eq_ignore_ascii_case("json");

    let dir = expand_tilde(&config.dir);
    std::fs::create_dir_all(&dir)?;
    let file_appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_ansi(false)
            .boxed()
    };

    let stdout_layer = match (output, is_json) {
        (LogOutput::FileOnly, _) => None,
        (LogOutput::Console, true) => Some(fmt::layer().json().with_target(true).boxed()),
        (LogOutput::Console, false) => Some(fmt::layer().with_target(true).boxed()),
    };

    Registry::default()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("failed to install logger: {}", e)))?;

    if let Err(e) = cleanup_old_logs(&dir, config.retention_days) {
        tracing::warn!("Failed to clean up old logs: {}", e);
    }

    Ok(guard)
}

fn build_filter(level: &str, config: &LoggingConfig) -> EnvFilter {
    let mut filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    for (module, level) in &config.overrides {
        match format!("{}={}", module, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => eprintln!("Invalid log directive: {}={}", module, level),
        }
    }

    filter
}

/// Remove rolled log files older than `days` days
fn cleanup_old_logs(dir: &Path, days: u64) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let now = std::time::SystemTime::now();
    let threshold = std::time::Duration::from_secs(days.saturating_mul(24 * 3600));
    let mut removed = 0;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !is_log {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > threshold) {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }

    Ok(removed)
}

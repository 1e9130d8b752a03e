//! Log setup
//!
//! stdout carries the protocol, so logs go to a file (appended) or, when the
//! file cannot be opened, to stderr.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Crates whose output is capped at `warn`
const NOISY_CRATES: &[&str] = &["hyper", "hyper_util", "reqwest"];

/// Map a level name (`DEBUG`, `INFO`, `WARNING`, `ERROR`, `CRITICAL`) to a
/// filter. Unknown names fall back to `ERROR`.
pub fn parse_level(raw: &str) -> LevelFilter {
    match raw.trim().to_ascii_uppercase().as_str() {
        "TRACE" => LevelFilter::TRACE,
        "DEBUG" => LevelFilter::DEBUG,
        "INFO" => LevelFilter::INFO,
        "WARN" | "WARNING" => LevelFilter::WARN,
        "ERROR" | "CRITICAL" => LevelFilter::ERROR,
        "OFF" => LevelFilter::OFF,
        _ => LevelFilter::ERROR,
    }
}

/// Filter directives for `level`, with HTTP internals never above `warn`
pub fn filter_directives(level: LevelFilter) -> String {
    let capped = level.min(LevelFilter::WARN);
    let mut directives = vec![level.to_string().to_lowercase()];
    directives.extend(
        NOISY_CRATES
            .iter()
            .map(|name| format!("{}={}", name, capped.to_string().to_lowercase())),
    );
    directives.join(",")
}

/// Where log lines end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

/// Install the global subscriber. An empty `log_file` path means stderr.
pub fn init(level: LevelFilter, log_file: &Path) -> anyhow::Result<LogTarget> {
    let filter = EnvFilter::try_new(filter_directives(level))?;

    let mut open_error = None;
    let (writer, ansi, target) = if log_file.as_os_str().is_empty() {
        (BoxMakeWriter::new(std::io::stderr), true, LogTarget::Stderr)
    } else {
        match OpenOptions::new().create(true).append(true).open(log_file) {
            Ok(file) => (
                BoxMakeWriter::new(Mutex::new(file)),
                false,
                LogTarget::File(log_file.to_path_buf()),
            ),
            Err(e) => {
                open_error = Some(e);
                (BoxMakeWriter::new(std::io::stderr), true, LogTarget::Stderr)
            }
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(ansi)
                .with_writer(writer),
        )
        .try_init()?;

    if let Some(e) = open_error {
        tracing::warn!(
            "Cannot open log file {}: {}; logging to stderr",
            log_file.display(),
            e
        );
    }

    Ok(target)
}

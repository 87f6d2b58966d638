//! File logging setup.
//!
//! Logging is off unless `--log <path>` is given or `OCTERM_LOG` is set. The
//! terminal belongs to the UI, so records only ever go to a file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable that enables logging and carries the filter directive.
pub const LOG_ENV: &str = "OCTERM_LOG";

const DEFAULT_FILTER: &str = "octerm=debug";
const DEFAULT_FILE_NAME: &str = "octerm.log";

/// Keeps the background log writer alive; drop it last.
#[must_use = "logs are lost when the guard is dropped"]
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

impl LogGuard {
    pub fn disabled() -> Self {
        Self { _guard: None }
    }
}

/// Where logs go and which filter applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub path: PathBuf,
    pub filter: String,
}

/// Decides the log target from the `--log` flag and the `OCTERM_LOG` value.
///
/// Returns `None` when logging stays off. Switch-like values (`1`, `true`,
/// `on`) select the default filter; anything else is used as the filter.
pub fn resolve_target(flag: Option<&Path>, env_value: Option<&str>) -> Option<LogTarget> {
    let env_value = env_value.map(str::trim);
    let path = match (flag, env_value) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(_)) => std::env::temp_dir().join(DEFAULT_FILE_NAME),
        (None, None) => return None,
    };

    let filter = match env_value {
        Some(value) if !value.is_empty() && !is_switch(value) => value.to_string(),
        _ => DEFAULT_FILTER.to_string(),
    };

    Some(LogTarget { path, filter })
}

fn is_switch(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Installs the global subscriber writing to a file, if logging is enabled.
///
/// # Errors
/// Returns an error if the log file cannot be opened.
pub fn init(flag: Option<&Path>) -> Result<LogGuard> {
    let env_value = std::env::var(LOG_ENV).ok();
    let Some(target) = resolve_target(flag, env_value.as_deref()) else {
        return Ok(LogGuard::disabled());
    };

    if let Some(parent) = target.path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&target.path)
        .with_context(|| format!("Failed to open log file {}", target.path.display()))?;

    let filter =
        EnvFilter::try_new(&target.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let (writer, guard) = tracing_appender::non_blocking(file);

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    Ok(LogGuard {
        _guard: Some(guard),
    })
}

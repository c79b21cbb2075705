//! Tracing setup. The terminal owns stdout, so events go to a log file in the
//! cache directory instead.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::store::app_cache_dir;

const LOG_FILE: &str = "matchcast.log";

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Installs the global subscriber. Later calls are no-ops. Returns the log
/// file path, or `None` when no cache directory could be resolved.
pub fn init() -> Result<Option<PathBuf>> {
    if LOG_GUARD.get().is_some() {
        return Ok(None);
    }
    let Some(dir) = app_cache_dir() else {
        return Ok(None);
    };
    init_in(&dir).map(Some)
}

pub fn init_in(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;

    let appender = rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer().with_ansi(false).with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .context("install tracing subscriber")?;
    let _ = LOG_GUARD.set(guard);

    let path = dir.join(LOG_FILE);
    tracing::info!("logging to {}", path.display());
    Ok(path)
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output always; optional JSON file output with run-based retention.

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Keeps file writers alive; logs are flushed when this is dropped
pub struct LoggingGuard {
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    run_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder receiving log files, if file logging is enabled
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }
}

/// Initialize the global tracing subscriber
///
/// With a `log_dir`, creates:
/// ```text
/// <log_dir>/
///   └── run_20250101_120000/
///       ├── b5dc-supervisor.log
///       ├── b5dc-device.log
///       └── b5dc-proxy.log (combined)
/// ```
///
/// # Arguments
/// * `debug_flags` - Per-crate debug flags
/// * `default_level` - Level for everything not covered by a debug flag
/// * `log_dir` - Base directory for log files; console only when `None`
/// * `retention_runs` - Keep N most recent runs (default: 10)
pub fn init_logging(
    debug_flags: &CrateDebugFlags,
    default_level: &str,
    log_dir: Option<PathBuf>,
    retention_runs: Option<usize>,
) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(default_level);
    let env_filter = EnvFilter::try_new(&filter)
        .with_context(|| format!("Invalid log filter: {}", filter))?;

    let mut layers = Vec::new();
    let mut file_guards = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(env_filter.clone());
    layers.push(console_layer.boxed());

    let run_dir = match log_dir {
        Some(base_log_dir) => {
            let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
            let run_folder = base_log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
            std::fs::create_dir_all(&run_folder).with_context(|| {
                format!("Failed to create log directory: {}", run_folder.display())
            })?;

            cleanup_old_runs(&base_log_dir, retention_runs.unwrap_or(10))?;

            for crate_name in crate::KNOWN_CRATES {
                let file_appender = rolling::daily(&run_folder, format!("{}.log", crate_name));
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                file_guards.push(guard);

                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .with_filter(EnvFilter::new(format!("{}=debug,off", crate_name)))
                    .boxed();
                layers.push(file_layer);
            }

            let combined_appender = rolling::daily(&run_folder, "combined.log");
            let (combined_non_blocking, combined_guard) =
                tracing_appender::non_blocking(combined_appender);
            file_guards.push(combined_guard);

            let combined_layer = tracing_subscriber::fmt::layer()
                .with_writer(combined_non_blocking)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(env_filter)
                .boxed();
            layers.push(combined_layer);

            Some(run_folder)
        }
        None => None,
    };

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(LoggingGuard {
        _file_guards: file_guards,
        run_dir,
    })
}

/// Remove all but the `retention_runs` most recent run folders
pub(crate) fn cleanup_old_runs(base_log_dir: &Path, retention_runs: usize) -> Result<()> {
    if !base_log_dir.exists() {
        return Ok(());
    }

    let mut runs: Vec<(PathBuf, NaiveDateTime)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(RUN_PREFIX))
            .and_then(|s| NaiveDateTime::parse_from_str(s, RUN_TIMESTAMP_FORMAT).ok());
        if let Some(stamp) = stamp {
            runs.push((path, stamp));
        }
    }

    if runs.len() <= retention_runs {
        return Ok(());
    }

    // Oldest first
    runs.sort_by_key(|(_, stamp)| *stamp);
    let to_remove = runs.len() - retention_runs;
    for (path, _) in runs.iter().take(to_remove) {
        if let Err(e) = std::fs::remove_dir_all(path) {
            eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            );
        }
    }

    Ok(())
}

//! Structured logging for gnbtriage
//!
//! Diagnostics go to stderr through `tracing`, so stdout stays reserved for
//! results (JSON reports, CSV, summaries) and can be piped safely.
//!
//! - **Pretty format**: human-friendly output for interactive runs
//! - **JSON format**: one JSON object per line for CI pipelines
//! - **File output**: optional append-only copy of every event
//!
//! # Correlation Fields
//!
//! Use these field names consistently in spans and events:
//! - `case_id`: identifier of the bundle being classified
//! - `path`: file the bundle was read from
//! - `line`: 1-based line number inside a JSONL input
//! - `rule`: cascade step that decided a verdict
//! - `severity`: stage number of the verdict
//!
//! Never log stream text at info level or above; logs can be megabytes.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

pub use crate::config::LogFormat;

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration (`[logging]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level or filter directive, e.g. `info` or `gnbtriage_core=debug`.
    /// `RUST_LOG` takes precedence when set.
    pub level: String,

    pub format: LogFormat,

    /// Optional log file, appended to alongside stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,

    #[error("invalid log filter: {0}")]
    InvalidLevel(String),

    #[error("failed to open log file: {0}")]
    FileCreate(#[from] io::Error),

    #[error("failed to install subscriber: {0}")]
    SetSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// One fmt layer in the requested format. `ansi` only applies to pretty output.
fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(ansi)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .flatten_event(true)
            .boxed(),
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

fn build_filter(level: &str) -> Result<EnvFilter, LogError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|_| LogError::InvalidLevel(level.to_string()))
}

/// Install the global subscriber: stderr in the configured format, plus the
/// log file when one is configured.
///
/// Call once at startup; later calls return [`LogError::AlreadyInitialized`].
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    let filter = build_filter(&config.level)?;
    let mut layers = vec![format_layer(config.format, io::stderr, true)];
    if let Some(path) = &config.file {
        let file = open_log_file(path)?;
        layers.push(format_layer(config.format, Mutex::new(file), false));
    }

    tracing::subscriber::set_global_default(Registry::default().with(layers).with(filter))?;
    let _ = LOGGING_INITIALIZED.set(());

    tracing::debug!(
        level = %config.level,
        format = %config.format,
        file = ?config.file,
        "Logging initialized"
    );
    Ok(())
}

/// Info span carrying correlation fields.
///
/// ```ignore
/// let span = gnbtriage_core::triage_span!("analyze_file", case_id = "op1_100_case_7/003.json");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! triage_span {
    ($name:expr $(, $field:ident = $value:expr)* $(,)?) => {
        tracing::info_span!($name $(, $field = $value)*)
    };
}

//! Logging bootstrap for `basketweaver` and other hosts of the core.
//!
//! # Responsibility
//! - Route `log` records either to size-rotated files or to stderr.
//! - Record panics as sanitized `key=value` events, never note content.
//!
//! # Invariants
//! - At most one logger per process; re-initialising with the same
//!   [`LogSpec`] is a no-op, a different one is rejected.
//! - Initialisation never panics.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, LogSpecification, Logger, LoggerHandle,
    Naming, WriteMode,
};
use log::LevelFilter;
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

const LOG_FILE_BASENAME: &str = "basket";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static ACTIVE: OnceCell<(LogSpec, LoggerHandle)> = OnceCell::new();

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Rotated `basket*.log` files in an absolute directory.
    File(PathBuf),
    /// Plain lines on stderr, for interactive runs.
    Stderr,
}

/// Level and destination of the process logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSpec {
    pub level: LevelFilter,
    pub target: LogTarget,
}

impl LogSpec {
    /// Builds a spec from a textual level (`trace` .. `error`, `warning`).
    pub fn new(level: &str, target: LogTarget) -> Result<Self, LoggingError> {
        Ok(Self {
            level: parse_level(level)?,
            target,
        })
    }
}

/// Errors from [`init_logging`].
#[derive(Debug)]
pub enum LoggingError {
    UnsupportedLevel(String),
    RelativeLogDir(PathBuf),
    CreateDir { path: PathBuf, source: io::Error },
    Start(FlexiLoggerError),
    /// A logger with another spec is already running.
    AlreadyStarted(LogSpec),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::RelativeLogDir(path) => {
                write!(f, "log directory must be absolute: {}", path.display())
            }
            Self::CreateDir { path, source } => {
                write!(f, "cannot create log directory {}: {source}", path.display())
            }
            Self::Start(err) => write!(f, "failed to start logger: {err}"),
            Self::AlreadyStarted(active) => {
                write!(f, "logging already started with {:?}", active)
            }
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Start(err) => Some(err),
            _ => None,
        }
    }
}

/// Starts the process logger described by `spec`.
pub fn init_logging(spec: &LogSpec) -> Result<(), LoggingError> {
    if let LogTarget::File(dir) = &spec.target {
        if !dir.is_absolute() {
            return Err(LoggingError::RelativeLogDir(dir.clone()));
        }
    }

    let (active, _) = ACTIVE.get_or_try_init(|| -> Result<_, LoggingError> {
        let handle = start(spec)?;
        install_panic_hook();
        log::info!(
            "event=logging_init module=logging status=ok level={} target={} version={}",
            spec.level,
            target_label(&spec.target),
            env!("CARGO_PKG_VERSION")
        );
        Ok((spec.clone(), handle))
    })?;

    if active != spec {
        return Err(LoggingError::AlreadyStarted(active.clone()));
    }
    Ok(())
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn start(spec: &LogSpec) -> Result<LoggerHandle, LoggingError> {
    let logger = Logger::with(LogSpecification::builder().default(spec.level).build());
    let logger = match &spec.target {
        LogTarget::File(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
                path: dir.clone(),
                source,
            })?;
            logger
                .log_to_file(
                    FileSpec::default()
                        .directory(dir.as_path())
                        .basename(LOG_FILE_BASENAME),
                )
                .rotate(
                    Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(MAX_LOG_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(flexi_logger::detailed_format)
        }
        LogTarget::Stderr => logger
            .log_to_stderr()
            .format_for_stderr(flexi_logger::default_format),
    };
    logger.start().map_err(LoggingError::Start)
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        "off" => Ok(LevelFilter::Off),
        other => Err(LoggingError::UnsupportedLevel(other.to_string())),
    }
}

fn target_label(target: &LogTarget) -> String {
    match target {
        LogTarget::File(dir) => dir.display().to_string(),
        LogTarget::Stderr => "stderr".to_string(),
    }
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        log::error!(
            "event=panic module=logging status=error location={location} payload={}",
            one_line(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous(info);
    }));
}

/// Newlines become spaces; longer values are cut at `max_chars` with `...`.
fn one_line(value: &str, max_chars: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

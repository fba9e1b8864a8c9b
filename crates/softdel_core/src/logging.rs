//! Rolling file logs for the soft-deletion layer.
//!
//! # Invariants
//! - Logging is initialized at most once per process; repeating the same
//!   configuration is a no-op, a different one is rejected.
//! - Initialization never panics.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable selecting the log level.
pub const LOG_LEVEL_ENV: &str = "SOFTDEL_LOG_LEVEL";
/// Environment variable selecting the absolute log directory.
pub const LOG_DIR_ENV: &str = "SOFTDEL_LOG_DIR";

const LOG_FILE_BASENAME: &str = "softdel";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    level: &'static str,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

/// Logging configuration as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// One of `trace|debug|info|warn|error`, case-insensitive.
    pub level: String,
    /// Absolute directory receiving rolling log files.
    pub log_dir: String,
}

impl LogConfig {
    pub fn new(level: impl Into<String>, log_dir: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            log_dir: log_dir.into(),
        }
    }

    /// Reads `SOFTDEL_LOG_LEVEL` and `SOFTDEL_LOG_DIR`.
    ///
    /// Returns `None` when no log directory is configured; the level falls
    /// back to [`default_log_level`].
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_blank =
            |key: &str| lookup(key).filter(|value: &String| !value.trim().is_empty());
        let log_dir = non_blank(LOG_DIR_ENV)?;
        let level = non_blank(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string());
        Some(Self { level, log_dir })
    }
}

/// Logging bootstrap failure.
#[derive(Debug)]
pub enum LogError {
    UnsupportedLevel(String),
    InvalidLogDir(String),
    CreateLogDir { path: PathBuf, reason: String },
    AlreadyActive { active: LogConfig, requested: LogConfig },
    Backend(String),
}

impl Display for LogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidLogDir(reason) => write!(f, "invalid log directory: {reason}"),
            Self::CreateLogDir { path, reason } => {
                write!(f, "failed to create log directory `{}`: {reason}", path.display())
            }
            Self::AlreadyActive { active, requested } => write!(
                f,
                "logging already active with level `{}` at `{}`; refusing to switch to `{}` at `{}`",
                active.level, active.log_dir, requested.level, requested.log_dir
            ),
            Self::Backend(reason) => write!(f, "failed to start logger: {reason}"),
        }
    }
}

impl std::error::Error for LogError {}

/// Starts rolling file logs described by `config`.
///
/// # Errors
/// - `UnsupportedLevel` / `InvalidLogDir` for malformed configuration.
/// - `AlreadyActive` when a different configuration is already running.
/// - `CreateLogDir` / `Backend` when the logger cannot be started.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let level = normalize_level(&config.level)?;
    let log_dir = normalize_log_dir(&config.log_dir)?;

    let active = ACTIVE.get_or_try_init(|| start_logger(level, &log_dir))?;
    if active.level != level || active.log_dir != log_dir {
        return Err(LogError::AlreadyActive {
            active: active.as_config(),
            requested: LogConfig::new(level, log_dir.display().to_string()),
        });
    }
    Ok(())
}

/// Configuration of the running logger, if any.
pub fn logging_status() -> Option<LogConfig> {
    ACTIVE.get().map(ActiveLogger::as_config)
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

impl ActiveLogger {
    fn as_config(&self) -> LogConfig {
        LogConfig::new(self.level, self.log_dir.display().to_string())
    }
}

fn start_logger(level: &'static str, log_dir: &Path) -> Result<ActiveLogger, LogError> {
    std::fs::create_dir_all(log_dir).map_err(|err| LogError::CreateLogDir {
        path: log_dir.to_path_buf(),
        reason: err.to_string(),
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(|err| LogError::Backend(err.to_string()))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
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
        .start()
        .map_err(|err| LogError::Backend(err.to_string()))?;

    install_panic_hook();
    info!(
        "event=logging_init module=logging status=ok version={} level={level} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        log_dir.display()
    );

    Ok(ActiveLogger {
        level,
        log_dir: log_dir.to_path_buf(),
        _handle: handle,
    })
}

fn normalize_level(level: &str) -> Result<&'static str, LogError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LogError::UnsupportedLevel(other.to_string())),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, LogError> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err(LogError::InvalidLogDir("path is empty".to_string()));
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(LogError::InvalidLogDir(format!(
            "`{trimmed}` is not an absolute path"
        )));
    }
    Ok(path.to_path_buf())
}

// Only reached from `start_logger`, which the OnceCell runs at most once.
fn install_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=logging status=error location={location} payload={}",
            single_line(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

// Panic payloads may carry record contents.
fn single_line(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    let mut capped: String = flattened.chars().take(max_chars).collect();
    if flattened.chars().count() > max_chars {
        capped.push_str("...");
    }
    capped
}

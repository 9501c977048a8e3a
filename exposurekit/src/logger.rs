use std::sync::{Arc, OnceLock};

/// Receives log records emitted by the persistence layer.
///
/// The host application implements this to route ExposureKit diagnostics
/// into its own logging pipeline. Exported via `UniFFI`.
///
/// # Examples
///
/// ```rust
/// use exposurekit::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Swift
///
/// ```swift
/// final class PersistenceLogBridge: ExposureKit.Logger {
///     func log(level: ExposureKit.LogLevel, message: String) {
///         os_log("%{public}@", log: .persistence, type: level.osLogType, message)
///     }
/// }
///
/// ExposureKit.setLogger(logger: PersistenceLogBridge(), minLevel: .info)
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Logs a message at the specified level.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, uniffi::Enum)]
pub enum LogLevel {
    /// Very detailed tracing output.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress of normal operations, such as startup reconciliation.
    Info,
    /// Tolerated anomalies, such as a stored value that no longer decodes.
    Warn,
    /// Conditions that indicate data loss or a programming defect.
    Error,
}

/// Bridges the `log` facade to the host-provided [`Logger`].
struct ForeignLogger {
    min_level: LogLevel,
}

impl log::Log for ForeignLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        log_level(metadata.level()) >= self.min_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Debug and trace output from other crates is noise for the host.
        let is_from_exposurekit = record
            .module_path()
            .is_some_and(|module_path| module_path.starts_with("exposurekit"));
        let is_debug_or_trace =
            record.level() == log::Level::Debug || record.level() == log::Level::Trace;
        if is_debug_or_trace && !is_from_exposurekit {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

const fn level_filter(level: LogLevel) -> log::LevelFilter {
    match level {
        LogLevel::Trace => log::LevelFilter::Trace,
        LogLevel::Debug => log::LevelFilter::Debug,
        LogLevel::Info => log::LevelFilter::Info,
        LogLevel::Warn => log::LevelFilter::Warn,
        LogLevel::Error => log::LevelFilter::Error,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();
static FOREIGN_LOGGER: OnceLock<ForeignLogger> = OnceLock::new();

/// Installs the host logger and forwards records at `min_level` and above.
///
/// Only the first call takes effect; later calls are ignored with a message
/// on stderr.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>, min_level: LogLevel) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    let bridge = FOREIGN_LOGGER.get_or_init(|| ForeignLogger { min_level });
    if let Err(e) = log::set_logger(bridge) {
        eprintln!("Failed to set logger: {e}");
        return;
    }
    log::set_max_level(level_filter(min_level));
}

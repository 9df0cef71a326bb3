//! Bridge from the `log` facade to a host-supplied logger.
//!
//! Every `log::warn!`/`log::error!` raised by the storage tiers reaches the
//! host once [`set_logger`] has been called. Debug and trace records from
//! other crates are dropped so dependency chatter does not flood the host log.

use std::sync::{Arc, OnceLock};

/// Receives log records from the storage tiers.
///
/// Implemented by the host application.
///
/// ```rust
/// use tierstore_core::logger::{LogLevel, Logger};
///
/// struct StdoutLogger;
///
/// impl Logger for StdoutLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         println!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Kotlin
///
/// ```kotlin
/// object TierstoreLogBridge : Logger {
///     override fun log(level: LogLevel, message: String) {
///         Timber.tag("tierstore").log(level.toPriority(), message)
///     }
/// }
///
/// setLogger(TierstoreLogBridge) // once, in Application.onCreate
/// ```
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait Logger: Sync + Send {
    /// Records `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LogLevel {
    /// Very detailed tracing.
    Trace,
    /// Debugging information, such as sweep summaries.
    Debug,
    /// Notable lifecycle events, such as a new encryption key.
    Info,
    /// Recoverable problems, such as a skipped corrupt cache entry.
    Warn,
    /// Failures, such as an initialization error or a fallback key.
    Error,
}

const CRATE_MODULE_PREFIX: &str = "tierstore";

struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), record.args().to_string());
        } else {
            eprintln!("tierstore logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

/// Drops debug and trace records that did not come from this workspace.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let verbose = matches!(level, log::Level::Debug | log::Level::Trace);
    let ours = module_path.is_some_and(|path| path.starts_with(CRATE_MODULE_PREFIX));
    !verbose || ours
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

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Installs the host logger. Only the first call takes effect.
#[cfg_attr(feature = "ffi", uniffi::export)]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("tierstore logger already set");
        return;
    }
    if let Err(err) = init_logger() {
        eprintln!("failed to install tierstore logger: {err}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

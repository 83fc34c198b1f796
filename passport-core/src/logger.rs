//! Bridges the `log` facade to a logger supplied by the host application.

use std::sync::{Arc, OnceLock};

/// Trait representing a logger that can log messages at various levels.
///
/// Implemented by the host application to receive the SDK's log output. It is exported via
/// `UniFFI` for use in foreign languages.
///
/// # Examples
///
/// ```rust
/// use passport_core::logger::{Logger, LogLevel};
///
/// struct MyLogger;
///
/// impl Logger for MyLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         println!("[{:?}] {}", level, message);
///     }
/// }
/// ```
///
/// ## Swift
///
/// ```swift
/// class PassportLoggerBridge: Passport.Logger {
///     static let shared = PassportLoggerBridge()
///
///     func log(level: Passport.LogLevel, message: String) {
///         os_log("%{public}@", message)
///     }
/// }
///
/// Passport.setLogger(logger: PassportLoggerBridge.shared) // once, in the app delegate
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity levels forwarded to the host logger.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum LogLevel {
    /// Very low priority, often extremely detailed messages.
    Trace,
    /// Lower priority debugging information.
    Debug,
    /// Progress of the SDK (login steps, submitted transactions).
    Info,
    /// Potentially harmful situations.
    Warn,
    /// Failures surfaced to the caller.
    Error,
}

/// Forwards `log` records to the user-provided [`Logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        should_forward(metadata.target(), metadata.level())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = match component(record.target()) {
            Some(component) => format!("[{component}] {}", record.args()),
            None => record.args().to_string(),
        };
        match LOGGER_INSTANCE.get() {
            Some(logger) => logger.log(log_level(record.level()), message),
            None => eprintln!("Logger not set: {message}"),
        }
    }

    fn flush(&self) {}
}

/// Debug and trace output from dependencies (reqwest, hyper, rustls) is dropped.
fn should_forward(target: &str, level: log::Level) -> bool {
    level <= log::Level::Info || target.starts_with("passport")
}

/// `passport_core::chain::client` becomes `chain::client`; foreign targets have no component.
fn component(target: &str) -> Option<&str> {
    target
        .strip_prefix("passport_core::")
        .or_else(|| (target == "passport_core").then_some("core"))
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

/// Sets the global logger.
///
/// Should be called once, before any other SDK call. Subsequent calls are ignored.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

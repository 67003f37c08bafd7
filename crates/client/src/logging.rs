//! Diagnostics for the socket layer.
//!
//! Every dropped frame, ignored event and reconnect decision goes through
//! these macros. Events land under the `chatlink_client::logging` target, so
//! a host can turn the connection chatter up or down with one `EnvFilter`
//! directive (the listen binary defaults to `chatlink_client=debug`). Nothing
//! here returns an error to the caller.

use tracing::Level;

/// Emit one preformatted line at `level`.
pub fn emit(level: Level, msg: &str) {
    match level {
        Level::ERROR => tracing::error!("{}", msg),
        Level::WARN => tracing::warn!("{}", msg),
        Level::INFO => tracing::info!("{}", msg),
        Level::DEBUG => tracing::debug!("{}", msg),
        _ => tracing::trace!("{}", msg),
    }
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::emit(::tracing::Level::INFO, &format!($($arg)*))
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::emit(::tracing::Level::ERROR, &format!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::emit(::tracing::Level::WARN, &format!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::emit(::tracing::Level::DEBUG, &format!($($arg)*))
    };
}

/// Log a trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::logging::emit(::tracing::Level::TRACE, &format!($($arg)*))
    };
}

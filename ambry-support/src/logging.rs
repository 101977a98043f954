//! The process-wide logging function used by resolution diagnostics.
//!
//! Diagnostics are human-facing text, not structured events, so they go
//! through a single replaceable sink rather than a `tracing` subscriber.
//! The sink can be installed once per process; until then, messages are
//! written to standard output.

use once_cell::sync::OnceCell;

type LoggingFunction = Box<dyn Fn(&str) + Send + Sync>;

static LOGGING_FUNCTION: OnceCell<LoggingFunction> = OnceCell::new();

/// Installs the process-wide logging function.
///
/// Returns `true` if the function was installed, `false` if another one
/// had already been installed earlier; the first installation wins.
///
/// # Examples
/// ```rust,ignore
/// ambry_support::logging::set_logging_function(|line| eprintln!("{line}"));
/// ```
pub fn set_logging_function(function: impl Fn(&str) + Send + Sync + 'static) -> bool {
    LOGGING_FUNCTION.set(Box::new(function)).is_ok()
}

/// Emits one diagnostics message through the installed function, or to
/// standard output when none has been installed.
pub fn log(message: &str) {
    match LOGGING_FUNCTION.get() {
        Some(function) => function(message),
        None => println!("{message}"),
    }
}

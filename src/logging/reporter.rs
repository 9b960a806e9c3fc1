//! Driver-station reporting channel
//!
//! Warnings and errors on the hardware channel bypass the console and are
//! reported synchronously through a [`HardwareReporter`].

use std::io::Write;

/// Synchronous sink for operator-visible warnings and errors
///
/// Reporting is best-effort; implementations swallow their own failures.
pub trait HardwareReporter: Send + Sync {
    fn report(&self, is_error: bool, code: i32, message: &str, location: &str, stacktrace: &str);
}

/// Reports in driver-station text form on stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Render one report the way the driver station displays it
    pub fn render(
        is_error: bool,
        code: i32,
        message: &str,
        location: &str,
        stacktrace: &str,
    ) -> String {
        let kind = if is_error { "ERROR" } else { "Warning" };
        let mut text = format!("{} {}: {} at {}\n", kind, code, message, location);
        if !stacktrace.is_empty() {
            text.push_str(stacktrace);
            if !stacktrace.ends_with('\n') {
                text.push('\n');
            }
        }
        text
    }
}

impl HardwareReporter for ConsoleReporter {
    fn report(&self, is_error: bool, code: i32, message: &str, location: &str, stacktrace: &str) {
        let text = Self::render(is_error, code, message, location, stacktrace);
        let _ = std::io::stderr().lock().write_all(text.as_bytes());
    }
}

/// Discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl HardwareReporter for NullReporter {
    fn report(&self, _is_error: bool, _code: i32, _message: &str, _location: &str, _stack: &str) {}
}

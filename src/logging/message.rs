//! Log message record and its source location

use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

/// Reference point for record timestamps, fixed on first use
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// The process-wide logging epoch
pub fn epoch() -> Instant {
    *EPOCH.get_or_init(Instant::now)
}

/// Where in the source a message was logged from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogLocation {
    pub file: String,
    pub function: String,
    pub line: u32,
}

impl LogLocation {
    pub fn new(file: impl Into<String>, function: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            function: function.into(),
            line,
        }
    }
}

impl fmt::Display for LogLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.function, self.line)
    }
}

/// Trim the machine-specific prefix off a source path
///
/// Starts the result at the first occurrence of `marker`, falling back to the
/// last `src` segment, or returns the path untouched if neither is present.
pub fn short_filename<'a>(name: &'a str, marker: &str) -> &'a str {
    let start = if marker.is_empty() {
        None
    } else {
        name.find(marker)
    };
    match start.or_else(|| name.rfind("src")) {
        Some(start) => &name[start..],
        None => name,
    }
}

/// A single log event
///
/// Built once per `log` call and never modified afterwards.
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub level: i32,
    pub code: i32,
    pub details: String,
    pub location: LogLocation,
    pub timestamp: Instant,
    pub stacktrace: String,
    pub originator: String,
}

impl LogMessage {
    /// Milliseconds between the logging epoch and this message
    pub fn timestamp_millis(&self) -> u64 {
        let millis = self.timestamp.saturating_duration_since(epoch()).as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

/// An error code given either by number or by registered name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRef<'a> {
    Number(i32),
    Name(&'a str),
}

impl From<i32> for CodeRef<'_> {
    fn from(code: i32) -> Self {
        CodeRef::Number(code)
    }
}

impl<'a> From<&'a str> for CodeRef<'a> {
    fn from(name: &'a str) -> Self {
        CodeRef::Name(name)
    }
}

impl<'a> From<&'a String> for CodeRef<'a> {
    fn from(name: &'a String) -> Self {
        CodeRef::Name(name.as_str())
    }
}

/// Parse the leading integer of a string the way C's `atoi` does
///
/// Skips leading whitespace, accepts one optional sign and then the longest
/// run of digits. Anything unparseable yields 0; overflow saturates.
pub fn parse_code_literal(text: &str) -> i32 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value * 10 + i64::from(b - b'0');
        if value > i64::from(i32::MAX) + 1 {
            break;
        }
    }
    if negative {
        value = -value;
    }
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

//! Logging pipeline for botlog
//!
//! Messages are routed synchronously to the console or the driver-station
//! hardware channel and queued as parseable records, which a background
//! flusher hands to weakly held listeners such as log files.

mod buffer;
mod file_writer;
mod flusher;
mod format;
mod level;
mod listener;
mod logger;
mod macros;
mod message;
mod reporter;
mod retention;
mod stack;

pub use buffer::PendingBuffer;
pub use file_writer::{
    create_log_file_path, init_tracing, open_log_file, FileListener, LogFileInfo,
    LOG_FILE_PREFIX, LOG_FILE_TIME_FORMAT,
};
pub use flusher::{flush_cycle, spawn_flusher, FlushReport, FlushSignal, PeriodicTrigger, Wake};
pub use format::{
    escape_field, format_default, format_parseable, parse_records, unescape_field, Formatter,
    FormatterRegistry, LogRecord, ParseError, RECORD_FIELDS,
};
pub use level::{HardwareLevel, LevelRegistry, DEBUG, ERROR, RESERVED, WARNING};
pub use listener::{ListenerId, ListenerSet, LogListener};
pub use logger::{global, init_global, shutdown_global, Logger, LoggerBuilder};
pub use message::{epoch, parse_code_literal, short_filename, CodeRef, LogLocation, LogMessage};
pub use reporter::{ConsoleReporter, HardwareReporter, NullReporter};
pub use retention::{cleanup_old_logs, log_file_started, RetentionPolicy};
pub use stack::{BacktraceSource, NoStackTrace, StackTraceSource};

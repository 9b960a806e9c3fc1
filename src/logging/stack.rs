//! Stack trace capture for log messages

use std::backtrace::Backtrace;

/// Produces the stack trace text attached to each message
pub trait StackTraceSource: Send + Sync {
    /// Capture the current stack, leaving out the innermost `skip` frames
    fn capture(&self, skip: usize) -> String;
}

/// Captures real backtraces with the standard library
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceSource;

impl StackTraceSource for BacktraceSource {
    fn capture(&self, skip: usize) -> String {
        let rendered = Backtrace::force_capture().to_string();
        skip_frames(&rendered, skip)
    }
}

/// Leaves stack traces empty
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStackTrace;

impl StackTraceSource for NoStackTrace {
    fn capture(&self, _skip: usize) -> String {
        String::new()
    }
}

fn is_frame_header(line: &str) -> bool {
    let trimmed = line.trim_start();
    match trimmed.split_once(':') {
        Some((index, _)) => !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Drop the first `skip` frames from a rendered backtrace
///
/// A frame is a numbered header line plus any `at file:line` lines under it.
fn skip_frames(rendered: &str, skip: usize) -> String {
    let mut frames_seen = 0;
    let mut kept = Vec::new();
    for line in rendered.lines() {
        if is_frame_header(line) {
            frames_seen += 1;
        }
        if frames_seen > skip {
            kept.push(line.trim_end());
        }
    }
    kept.join("\n")
}

//! The logger service
//!
//! Every `log` call builds a [`LogMessage`], sends it synchronously to either
//! the hardware channel or the console, and appends its parseable record to
//! the pending buffer. A background flusher later hands the accumulated text
//! to every live listener.
//!
//! Two locks are involved and never nested: the pending-buffer lock (held only
//! for an append or the drain swap) and the listener-set lock (held only to
//! register, remove, snapshot or evict listeners).

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, Weak};
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};

use super::buffer::PendingBuffer;
use super::flusher::{flush_cycle, spawn_flusher, FlushSignal, PeriodicTrigger, Wake};
use super::format::{format_default, format_parseable, Formatter, FormatterRegistry};
use super::level::{HardwareLevel, LevelRegistry, WARNING};
use super::listener::{ListenerId, ListenerSet, LogListener};
use super::message::{epoch, parse_code_literal, CodeRef, LogLocation, LogMessage};
use super::reporter::{ConsoleReporter, HardwareReporter};
use super::stack::{BacktraceSource, NoStackTrace, StackTraceSource};
use crate::config::Config;
use crate::error_codes::{ErrorCodeResolver, GlobalErrorCodes};

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between callers and the flusher thread
struct Shared {
    levels: RwLock<LevelRegistry>,
    formatters: RwLock<FormatterRegistry>,
    stdout_enabled: AtomicBool,
    hardware_enabled: AtomicBool,
    pending: PendingBuffer,
    listeners: Mutex<ListenerSet>,
    signal: Arc<FlushSignal>,
    resolver: Arc<dyn ErrorCodeResolver>,
    reporter: Arc<dyn HardwareReporter>,
    stack: Arc<dyn StackTraceSource>,
    console: Mutex<Box<dyn Write + Send>>,
    project_marker: String,
    stack_depth: usize,
}

impl Shared {
    fn resolve_code(&self, code: CodeRef<'_>) -> i32 {
        match code {
            CodeRef::Number(code) => code,
            // Numeric text wins over a registered name that happens to parse
            CodeRef::Name(name) => match parse_code_literal(name) {
                0 => self.resolver.get_code(name),
                code => code,
            },
        }
    }

    fn level_name(&self, level: i32) -> String {
        self.levels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .name(level)
            .to_string()
    }

    fn formatter(&self, level: i32) -> Option<Formatter> {
        self.formatters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(level)
    }

    fn log(
        &self,
        level: i32,
        code: i32,
        details: &str,
        location: LogLocation,
        originator: &str,
        depth: usize,
    ) {
        let msg = LogMessage {
            level,
            code,
            details: details.to_string(),
            location,
            timestamp: Instant::now(),
            stacktrace: self.stack.capture(depth),
            originator: originator.to_string(),
        };

        match HardwareLevel::from_level(level) {
            Some(hardware) => {
                if self.hardware_enabled.load(Ordering::Relaxed) {
                    self.reporter.report(
                        hardware.is_error(),
                        msg.code,
                        &msg.details,
                        &msg.location.to_string(),
                        &msg.stacktrace,
                    );
                }
            }
            None => {
                if self.stdout_enabled.load(Ordering::Relaxed) {
                    self.write_console(&msg);
                }
            }
        }

        let record = match self.formatter(level) {
            Some(formatter) => formatter(&msg),
            None => format_parseable(
                &msg,
                &self.level_name(level),
                &self.resolver.get(msg.code),
            ),
        };
        self.pending.append(&record);
    }

    fn write_console(&self, msg: &LogMessage) {
        let line = match self.formatter(msg.level) {
            Some(formatter) => formatter(msg),
            None => format_default(msg, &self.level_name(msg.level), &self.project_marker),
        };
        let _ = lock(&self.console).write_all(line.as_bytes());
    }

    /// One flusher wake: drain, write, then report evicted listeners
    fn flush_once(&self, wake: Wake) {
        let report = flush_cycle(&self.pending, &self.listeners);
        if report.bytes > 0 {
            tracing::debug!(
                bytes = report.bytes,
                written = report.written,
                failed = report.failed,
                "Flushed log batch"
            );
        }
        // Lands in the next batch, not the one just written
        for _ in &report.evicted {
            self.log(
                WARNING,
                0,
                "Deleting log listener from listener list.",
                crate::log_location!(),
                "",
                self.stack_depth,
            );
        }
        // No later cycle will pick up the eviction notices
        if wake == Wake::Stop && !report.evicted.is_empty() {
            flush_cycle(&self.pending, &self.listeners);
        }
    }
}

/// Builder for a [`Logger`] with its collaborators
pub struct LoggerBuilder {
    config: Config,
    resolver: Option<Arc<dyn ErrorCodeResolver>>,
    reporter: Option<Arc<dyn HardwareReporter>>,
    stack: Option<Arc<dyn StackTraceSource>>,
    console: Option<Box<dyn Write + Send>>,
}

impl LoggerBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Error code table; defaults to the process-wide [`crate::error_codes::ErrorCodes`]
    pub fn resolver(mut self, resolver: Arc<dyn ErrorCodeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Hardware channel sink; defaults to [`ConsoleReporter`]
    pub fn reporter(mut self, reporter: Arc<dyn HardwareReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Stack trace source; defaults to backtraces unless disabled in the config
    pub fn stack_traces(mut self, stack: Arc<dyn StackTraceSource>) -> Self {
        self.stack = Some(stack);
        self
    }

    /// Console output; defaults to stdout
    pub fn console(mut self, console: Box<dyn Write + Send>) -> Self {
        self.console = Some(console);
        self
    }

    /// Start the flusher (and the periodic trigger, if enabled)
    pub fn start(self) -> Result<Logger> {
        epoch();

        let config = self.config;
        let mut levels = LevelRegistry::default();
        for custom in &config.custom_levels {
            if !levels.add(custom.level, custom.name.clone()) {
                tracing::warn!(
                    "Level {} is reserved or already registered, ignoring name '{}'",
                    custom.level,
                    custom.name
                );
            }
        }

        let stack = self.stack.unwrap_or_else(|| {
            if config.capture_stack_traces {
                Arc::new(BacktraceSource)
            } else {
                Arc::new(NoStackTrace)
            }
        });

        let shared = Arc::new(Shared {
            levels: RwLock::new(levels),
            formatters: RwLock::new(FormatterRegistry::default()),
            stdout_enabled: AtomicBool::new(config.stdout_enabled),
            hardware_enabled: AtomicBool::new(config.hardware_enabled),
            pending: PendingBuffer::new(),
            listeners: Mutex::new(ListenerSet::new()),
            signal: Arc::new(FlushSignal::new()),
            resolver: self.resolver.unwrap_or_else(|| Arc::new(GlobalErrorCodes)),
            reporter: self.reporter.unwrap_or_else(|| Arc::new(ConsoleReporter)),
            stack,
            console: Mutex::new(self.console.unwrap_or_else(|| Box::new(std::io::stdout()))),
            project_marker: config.project_marker.clone(),
            stack_depth: config.stack_depth,
        });

        let flusher_shared = Arc::clone(&shared);
        let flusher = spawn_flusher(Arc::clone(&shared.signal), move |wake| {
            flusher_shared.flush_once(wake)
        })
        .context("Failed to start log flusher thread")?;

        let logger = Logger {
            shared,
            flusher: Mutex::new(Some(flusher)),
            periodic: Mutex::new(None),
        };

        if let Some(period) = config.flush_period() {
            let signal = Arc::clone(&logger.shared.signal);
            let trigger = PeriodicTrigger::start(period, move || signal.notify())
                .context("Failed to start periodic flush thread")?;
            *lock(&logger.periodic) = Some(trigger);
        }

        Ok(logger)
    }
}

/// Leveled logger fanning messages out to the console, the hardware channel
/// and registered listeners
///
/// Dropping the logger (or calling [`Logger::shutdown`]) stops the periodic
/// trigger, runs a final flush and joins the flusher thread.
pub struct Logger {
    shared: Arc<Shared>,
    flusher: Mutex<Option<JoinHandle<()>>>,
    periodic: Mutex<Option<PeriodicTrigger>>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder {
            config: Config::default(),
            resolver: None,
            reporter: None,
            stack: None,
            console: None,
        }
    }

    /// Start a logger with the default collaborators
    pub fn new(config: Config) -> Result<Self> {
        Self::builder().config(config).start()
    }

    /// Log one message
    ///
    /// `code` is either a numeric code or a code name. A name that parses as a
    /// non-zero integer is used as that number rather than looked up.
    pub fn log<'a>(
        &self,
        level: i32,
        code: impl Into<CodeRef<'a>>,
        details: &str,
        location: LogLocation,
        originator: &str,
    ) {
        self.log_with_depth(
            level,
            code,
            details,
            location,
            originator,
            self.shared.stack_depth,
        );
    }

    /// Log one message, skipping `depth` frames of the captured stack trace
    pub fn log_with_depth<'a>(
        &self,
        level: i32,
        code: impl Into<CodeRef<'a>>,
        details: &str,
        location: LogLocation,
        originator: &str,
        depth: usize,
    ) {
        let code = self.shared.resolve_code(code.into());
        self.shared
            .log(level, code, details, location, originator, depth);
    }

    /// Ask the flusher to write pending records now; does not wait for it
    pub fn flush_stream(&self) {
        self.shared.signal.notify();
    }

    pub fn set_stdout_enable(&self, enabled: bool) {
        self.shared.stdout_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn stdout_enabled(&self) -> bool {
        self.shared.stdout_enabled.load(Ordering::Relaxed)
    }

    /// Enable or disable the driver-station channel for hardware levels
    ///
    /// Disabling it hides warnings and errors from the driver station log viewer.
    pub fn set_hardware_channel_enable(&self, enabled: bool) {
        self.shared.hardware_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn hardware_channel_enabled(&self) -> bool {
        self.shared.hardware_enabled.load(Ordering::Relaxed)
    }

    /// Register a named level; returns false if the level already has a name
    pub fn add_level(&self, level: i32, name: &str) -> bool {
        self.shared
            .levels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(level, name)
    }

    pub fn level_name(&self, level: i32) -> String {
        self.shared.level_name(level)
    }

    /// Use `formatter` for both console and listener output of `level`
    pub fn add_formatter<F>(&self, level: i32, formatter: F)
    where
        F: Fn(&LogMessage) -> String + Send + Sync + 'static,
    {
        self.shared
            .formatters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(level, Arc::new(formatter));
    }

    /// Register a listener without taking ownership of it
    pub fn add_listener<L: LogListener + 'static>(&self, listener: &Arc<L>) -> ListenerId {
        let weak: Weak<L> = Arc::downgrade(listener);
        let weak: Weak<dyn LogListener> = weak;
        self.add_listener_weak(weak)
    }

    pub fn add_listener_weak(&self, listener: Weak<dyn LogListener>) -> ListenerId {
        lock(&self.shared.listeners).insert(listener)
    }

    /// Unregister a listener; false if it was not registered
    pub fn remove_listener<L: LogListener + 'static>(&self, listener: &Arc<L>) -> bool {
        let weak: Weak<L> = Arc::downgrade(listener);
        let weak: Weak<dyn LogListener> = weak;
        self.remove_listener_weak(&weak)
    }

    pub fn remove_listener_weak(&self, listener: &Weak<dyn LogListener>) -> bool {
        lock(&self.shared.listeners).remove_sink(listener)
    }

    pub fn remove_listener_id(&self, id: ListenerId) -> bool {
        lock(&self.shared.listeners).remove(id)
    }

    /// Registered listeners, including dead ones not yet evicted
    pub fn listener_count(&self) -> usize {
        lock(&self.shared.listeners).len()
    }

    /// Bytes waiting for the next flush
    pub fn pending_len(&self) -> usize {
        self.shared.pending.len()
    }

    /// Stop background threads after a final flush
    ///
    /// Listeners found dead during that flush are reported to the survivors
    /// before the flusher exits. Idempotent. Messages logged afterwards still reach the console and the
    /// hardware channel but are never flushed to listeners.
    pub fn shutdown(&self) {
        if let Some(mut trigger) = lock(&self.periodic).take() {
            trigger.stop();
        }
        self.shared.signal.stop();
        if let Some(handle) = lock(&self.flusher).take() {
            if handle.join().is_err() {
                tracing::warn!("Log flusher thread panicked");
            }
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Start the process-wide logger with `config`
///
/// Fails if the global logger already exists or its threads cannot start.
pub fn init_global(config: Config) -> Result<&'static Logger> {
    if GLOBAL_LOGGER.get().is_some() {
        return Err(anyhow!("Global logger is already initialized"));
    }
    let logger = Logger::new(config)?;
    GLOBAL_LOGGER
        .set(logger)
        .map_err(|_| anyhow!("Global logger is already initialized"))?;
    GLOBAL_LOGGER
        .get()
        .ok_or_else(|| anyhow!("Global logger is not initialized"))
}

/// The process-wide logger, started with default settings on first use
pub fn global() -> &'static Logger {
    GLOBAL_LOGGER.get_or_init(|| match Logger::new(Config::default()) {
        Ok(logger) => logger,
        Err(e) => panic!("Failed to start the global logger: {:#}", e),
    })
}

/// Flush and stop the process-wide logger, if it was started
///
/// Statics are never dropped, so call this before the process exits.
pub fn shutdown_global() {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        logger.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_codes::ErrorCodes;
    use crate::logging::format::parse_records;
    use crate::logging::level::{DEBUG, ERROR};
    use std::io;
    use std::thread;
    use std::time::Duration;

    /// Writer whose output can be inspected after being boxed
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        reports: Mutex<Vec<(bool, i32, String, String)>>,
        stacks: Mutex<Vec<String>>,
    }

    impl HardwareReporter for RecordingReporter {
        fn report(&self, is_error: bool, code: i32, message: &str, location: &str, stack: &str) {
            self.reports.lock().unwrap().push((
                is_error,
                code,
                message.to_string(),
                location.to_string(),
            ));
            self.stacks.lock().unwrap().push(stack.to_string());
        }
    }

    /// Stack source that echoes the requested skip depth
    #[derive(Default)]
    struct DepthEcho {
        skips: Mutex<Vec<usize>>,
    }

    impl StackTraceSource for DepthEcho {
        fn capture(&self, skip: usize) -> String {
            self.skips.lock().unwrap().push(skip);
            format!("frames,{};skipped", skip)
        }
    }

    struct PanickingSink;

    impl LogListener for PanickingSink {
        fn write_batch(&self, _text: &str) -> io::Result<()> {
            panic!("sink exploded");
        }
    }

    struct Harness {
        logger: Logger,
        console: Captured,
        reporter: Arc<RecordingReporter>,
        codes: Arc<ErrorCodes>,
    }

    fn quiet_config() -> Config {
        Config {
            flush_period_ms: 0,
            capture_stack_traces: false,
            ..Config::default()
        }
    }

    fn harness_with(config: Config) -> Harness {
        let console = Captured::default();
        let reporter = Arc::new(RecordingReporter::default());
        let codes = Arc::new(ErrorCodes::new());
        let logger = Logger::builder()
            .config(config)
            .console(Box::new(console.clone()))
            .reporter(reporter.clone())
            .resolver(codes.clone())
            .start()
            .unwrap();
        Harness {
            logger,
            console,
            reporter,
            codes,
        }
    }

    fn harness() -> Harness {
        harness_with(quiet_config())
    }

    fn sink() -> Arc<Mutex<Vec<u8>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn sink_text(sink: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(sink.lock().unwrap().clone()).unwrap()
    }

    /// Poll until `done` holds or a generous deadline passes
    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    fn location() -> LogLocation {
        LogLocation::new("a.cpp", "f", 10)
    }

    #[test]
    fn test_debug_message_end_to_end() {
        let h = harness();
        let listener = sink();
        h.logger.add_listener(&listener);

        h.logger
            .log(DEBUG, "Timeout", "connection lost", location(), "SensorX");
        assert_eq!(h.console.text(), "[DEBUG]: From a.cpp:f:10: connection lost\n");

        h.logger.flush_stream();
        assert!(wait_until(|| !sink_text(&listener).is_empty()));
        let text = sink_text(&listener);
        assert!(text.starts_with("1,DEBUG,-6,A timeout has been exceeded,a.cpp:f:10,"));
        assert!(text.ends_with(",,SensorX,connection lost;\n"));
    }

    #[test]
    fn test_numeric_name_is_not_looked_up() {
        let h = harness();
        h.codes.add(-300, "Named forty-two", Some("42"));
        let listener = sink();
        h.logger.add_listener(&listener);

        h.logger.log(DEBUG, "42", "numeric name", location(), "");
        h.logger.log(DEBUG, "NoSuchCode", "unknown name", location(), "");
        h.logger.log(DEBUG, -28, "plain number", location(), "");
        h.logger.flush_stream();

        assert!(wait_until(|| sink_text(&listener).matches(";\n").count() == 3));
        let records = parse_records(&sink_text(&listener)).unwrap();
        assert_eq!(records[0].code, 42);
        assert_eq!(records[0].code_message, "");
        assert_eq!(records[1].code, 0);
        assert_eq!(records[2].code, -28);
        assert_eq!(records[2].code_message, "A parameter is out of range.");
    }

    #[test]
    fn test_unknown_level_has_empty_name() {
        let h = harness();
        let listener = sink();
        h.logger.add_listener(&listener);

        h.logger.log(42, 0, "custom level", location(), "");
        assert_eq!(h.console.text(), "[]: From a.cpp:f:10: custom level\n");

        h.logger.flush_stream();
        assert!(wait_until(|| !sink_text(&listener).is_empty()));
        let records = parse_records(&sink_text(&listener)).unwrap();
        assert_eq!(records[0].level, 42);
        assert_eq!(records[0].level_name, "");
    }

    #[test]
    fn test_stdout_toggle_does_not_change_buffer() {
        let h = harness();
        let listener = sink();
        h.logger.add_listener(&listener);

        h.logger.log(DEBUG, 0, "visible", location(), "");
        h.logger.set_stdout_enable(false);
        assert!(!h.logger.stdout_enabled());
        h.logger.log(DEBUG, 0, "hidden", location(), "");

        assert_eq!(h.console.text(), "[DEBUG]: From a.cpp:f:10: visible\n");

        h.logger.flush_stream();
        assert!(wait_until(|| sink_text(&listener).matches(";\n").count() == 2));
        let records = parse_records(&sink_text(&listener)).unwrap();
        assert_eq!(records[0].details, "visible");
        assert_eq!(records[1].details, "hidden");
    }

    #[test]
    fn test_hardware_levels_go_to_reporter_not_console() {
        let h = harness();
        let listener = sink();
        h.logger.add_listener(&listener);

        h.logger.log(WARNING, "Timeout", "slow", location(), "");
        h.logger.log(ERROR, -5, "broken", location(), "");
        assert_eq!(h.console.text(), "");

        let reports = h.reporter.reports.lock().unwrap().clone();
        assert_eq!(
            reports,
            vec![
                (false, -6, "slow".to_string(), "a.cpp:f:10".to_string()),
                (true, -5, "broken".to_string(), "a.cpp:f:10".to_string()),
            ]
        );

        h.logger.flush_stream();
        assert!(wait_until(|| sink_text(&listener).matches(";\n").count() == 2));
        let records = parse_records(&sink_text(&listener)).unwrap();
        assert_eq!(records[0].level_name, "WARNING");
        assert_eq!(records[1].level_name, "ERROR");
    }

    #[test]
    fn test_hardware_channel_disabled_still_buffers() {
        let h = harness();
        let listener = sink();
        h.logger.add_listener(&listener);
        h.logger.set_hardware_channel_enable(false);
        assert!(!h.logger.hardware_channel_enabled());

        h.logger.log(ERROR, 0, "quiet error", location(), "");
        assert!(h.reporter.reports.lock().unwrap().is_empty());
        assert_eq!(h.console.text(), "");

        h.logger.flush_stream();
        assert!(wait_until(|| sink_text(&listener).contains("quiet error;\n")));
    }

    #[test]
    fn test_custom_formatter_overrides_both_outputs() {
        let h = harness();
        let listener = sink();
        h.logger.add_listener(&listener);
        assert!(h.logger.add_level(7, "AUDIT"));
        h.logger
            .add_formatter(7, |m: &LogMessage| format!("audit:{}\n", m.details));

        h.logger.log(7, 0, "door opened", location(), "");
        assert_eq!(h.console.text(), "audit:door opened\n");

        h.logger.flush_stream();
        assert!(wait_until(|| sink_text(&listener) == "audit:door opened\n"));
    }

    #[test]
    fn test_add_level_keeps_existing_names() {
        let h = harness();
        assert!(!h.logger.add_level(DEBUG, "VERBOSE"));
        assert_eq!(h.logger.level_name(DEBUG), "DEBUG");
        assert!(h.logger.add_level(9, "TRACE"));
        assert_eq!(h.logger.level_name(9), "TRACE");
    }

    #[test]
    fn test_custom_levels_from_config() {
        let mut config = quiet_config();
        config.custom_levels.push(crate::config::CustomLevel::new(5, "TELEMETRY"));
        config.custom_levels.push(crate::config::CustomLevel::new(1, "RENAMED"));
        config.custom_levels.push(crate::config::CustomLevel::new(0, "NONE"));
        let h = harness_with(config);
        assert_eq!(h.logger.level_name(5), "TELEMETRY");
        assert_eq!(h.logger.level_name(1), "DEBUG");
        assert_eq!(h.logger.level_name(0), "");
    }

    #[test]
    fn test_dead_listener_is_evicted_and_reported() {
        let h = harness();
        let alive = sink();
        let dead = sink();
        h.logger.add_listener(&alive);
        h.logger.add_listener(&dead);
        assert_eq!(h.logger.listener_count(), 2);
        drop(dead);

        h.logger.log(DEBUG, 0, "first", location(), "");
        h.logger.flush_stream();
        assert!(wait_until(|| h.logger.listener_count() == 1));
        assert!(sink_text(&alive).contains("first;\n"));
        assert!(!sink_text(&alive).contains("Deleting log listener"));

        // The eviction warning was queued for the following cycle
        h.logger.flush_stream();
        assert!(wait_until(|| sink_text(&alive)
            .contains("Deleting log listener from listener list.")));
        let warnings = h.reporter.reports.lock().unwrap().clone();
        assert!(warnings.iter().any(|r| !r.0 && r.2.contains("Deleting log listener")));
    }

    #[test]
    fn test_eviction_notice_delivered_on_shutdown() {
        let h = harness();
        let alive = sink();
        let dead = sink();
        h.logger.add_listener(&alive);
        h.logger.add_listener(&dead);
        drop(dead);

        h.logger.log(DEBUG, 0, "before stop", location(), "");
        h.logger.shutdown();

        let text = sink_text(&alive);
        assert!(text.contains("before stop;\n"));
        assert!(text.contains("Deleting log listener from listener list.;\n"));
        assert_eq!(h.logger.listener_count(), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_flushing() {
        let h = harness();
        let bad = Arc::new(PanickingSink);
        h.logger.add_listener(&bad);

        h.logger.log(DEBUG, 0, "first", location(), "");
        h.logger.flush_stream();
        assert!(wait_until(|| h.logger.pending_len() == 0));

        assert!(h.logger.remove_listener(&bad));
        let good = sink();
        h.logger.add_listener(&good);

        h.logger.log(DEBUG, 0, "second", location(), "");
        h.logger.flush_stream();
        assert!(wait_until(|| sink_text(&good).contains("second;\n")));
        assert_eq!(h.logger.pending_len(), 0);
    }

    #[test]
    fn test_remove_expired_weak_listener() {
        let h = harness();
        let listener = sink();
        let weak: Weak<Mutex<Vec<u8>>> = Arc::downgrade(&listener);
        let weak: Weak<dyn LogListener> = weak;
        h.logger.add_listener_weak(weak.clone());
        drop(listener);

        assert!(h.logger.remove_listener_weak(&weak));
        assert_eq!(h.logger.listener_count(), 0);
        assert!(!h.logger.remove_listener_weak(&weak));
    }

    #[test]
    fn test_stack_depth_reaches_source_and_outputs() {
        let console = Captured::default();
        let reporter = Arc::new(RecordingReporter::default());
        let stack = Arc::new(DepthEcho::default());
        let logger = Logger::builder()
            .config(quiet_config())
            .console(Box::new(console.clone()))
            .reporter(reporter.clone())
            .resolver(Arc::new(ErrorCodes::new()))
            .stack_traces(stack.clone())
            .start()
            .unwrap();
        let listener = sink();
        logger.add_listener(&listener);

        logger.log(DEBUG, 0, "default depth", location(), "");
        logger.log_with_depth(WARNING, -6, "explicit depth", location(), "", 7);
        assert_eq!(*stack.skips.lock().unwrap(), vec![3, 7]);
        assert_eq!(
            *reporter.stacks.lock().unwrap(),
            vec!["frames,7;skipped".to_string()]
        );

        logger.shutdown();
        let text = sink_text(&listener);
        assert!(text.contains(",frames\\,3\\;skipped,,default depth;\n"));
        let records = parse_records(&text).unwrap();
        assert_eq!(records[0].stacktrace, "frames,3;skipped");
        assert_eq!(records[1].stacktrace, "frames,7;skipped");
    }

    #[test]
    fn test_level_zero_is_reserved() {
        let h = harness();
        assert!(!h.logger.add_level(0, "NONE"));
        assert_eq!(h.logger.level_name(0), "");
    }

    #[test]
    fn test_removed_listener_receives_nothing() {
        let h = harness();
        let kept = sink();
        let removed = sink();
        h.logger.add_listener(&kept);
        let id = h.logger.add_listener(&removed);

        assert!(h.logger.remove_listener(&removed));
        assert!(!h.logger.remove_listener(&removed));
        assert!(!h.logger.remove_listener_id(id));

        h.logger.log(DEBUG, 0, "only kept", location(), "");
        h.logger.flush_stream();
        assert!(wait_until(|| !sink_text(&kept).is_empty()));
        assert!(sink_text(&removed).is_empty());
    }

    #[test]
    fn test_concurrent_producers_single_flush() {
        const PRODUCERS: usize = 16;
        let h = harness();
        let listener = sink();
        h.logger.add_listener(&listener);

        thread::scope(|scope| {
            for i in 0..PRODUCERS {
                let logger = &h.logger;
                scope.spawn(move || {
                    logger.log(DEBUG, 0, &format!("producer {}; done", i), location(), "");
                });
            }
        });

        h.logger.flush_stream();
        assert!(wait_until(|| !sink_text(&listener).is_empty()));
        thread::sleep(Duration::from_millis(20));

        let text = sink_text(&listener);
        assert_eq!(text.matches(";\n").count(), PRODUCERS);
        assert_eq!(parse_records(&text).unwrap().len(), PRODUCERS);
        assert_eq!(h.logger.pending_len(), 0);
    }

    #[test]
    fn test_periodic_trigger_flushes_without_request() {
        let mut config = quiet_config();
        config.flush_period_ms = 10;
        let h = harness_with(config);
        let listener = sink();
        h.logger.add_listener(&listener);

        h.logger.log(DEBUG, 0, "timed", location(), "");
        assert!(wait_until(|| sink_text(&listener).contains("timed;\n")));
    }

    #[test]
    fn test_shutdown_flushes_pending_and_is_idempotent() {
        let h = harness();
        let listener = sink();
        h.logger.add_listener(&listener);

        h.logger.log(DEBUG, 0, "last words", location(), "");
        h.logger.shutdown();
        assert!(sink_text(&listener).contains("last words;\n"));

        h.logger.shutdown();
        h.logger.log(DEBUG, 0, "after shutdown", location(), "");
        assert!(h.logger.pending_len() > 0);
    }

    #[test]
    fn test_empty_flush_is_harmless() {
        let h = harness();
        let listener = sink();
        h.logger.add_listener(&listener);
        for _ in 0..5 {
            h.logger.flush_stream();
        }
        thread::sleep(Duration::from_millis(20));
        assert!(sink_text(&listener).is_empty());
    }

    #[test]
    fn test_global_logger_is_single_instance() {
        let first = global() as *const Logger;
        let second = global() as *const Logger;
        assert_eq!(first, second);
    }
}

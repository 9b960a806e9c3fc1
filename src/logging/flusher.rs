//! Background flushing
//!
//! One flusher thread sleeps on a [`FlushSignal`] and runs a flush cycle each
//! time it is woken, either by an explicit flush request or by the
//! [`PeriodicTrigger`] timer. Wakes collapse into a single pending flag, so
//! extra wakes while a flush is running cost one empty cycle at most.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::buffer::PendingBuffer;
use super::listener::{ListenerId, ListenerSet};

/// Why the flusher woke up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Flush,
    /// Shutdown was requested; run one last cycle and exit
    Stop,
}

#[derive(Debug, Default)]
struct SignalState {
    requested: bool,
    stopping: bool,
}

/// Single-slot wake signal shared by producers, the timer, and the flusher
#[derive(Debug, Default)]
pub struct FlushSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl FlushSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request a flush; repeated requests before the flusher runs collapse into one
    pub fn notify(&self) {
        self.lock().requested = true;
        self.cond.notify_one();
    }

    /// Ask the flusher to run a final cycle and exit
    pub fn stop(&self) {
        self.lock().stopping = true;
        self.cond.notify_all();
    }

    pub fn is_stopping(&self) -> bool {
        self.lock().stopping
    }

    /// Block until a flush or stop is requested, consuming the request
    pub fn wait(&self) -> Wake {
        let guard = self.lock();
        let mut state = self
            .cond
            .wait_while(guard, |s| !s.requested && !s.stopping)
            .unwrap_or_else(PoisonError::into_inner);
        state.requested = false;
        if state.stopping {
            Wake::Stop
        } else {
            Wake::Flush
        }
    }
}

/// Outcome of one flush cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Bytes drained from the pending buffer
    pub bytes: usize,
    /// Listeners that received the batch
    pub written: usize,
    /// Listeners whose write failed or panicked
    pub failed: usize,
    /// Dead listeners removed from the set
    pub evicted: Vec<ListenerId>,
}

/// Drain `pending` and hand the text to every live listener
///
/// The listener lock is held only to copy the set and to evict dead entries,
/// never across a sink write. A sink that panics counts as failed and does not
/// stop the remaining sinks.
pub fn flush_cycle(pending: &PendingBuffer, listeners: &Mutex<ListenerSet>) -> FlushReport {
    let text = pending.take();
    if text.is_empty() {
        return FlushReport::default();
    }

    let snapshot = listeners
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .snapshot();

    let mut report = FlushReport {
        bytes: text.len(),
        ..FlushReport::default()
    };
    for (id, weak) in snapshot {
        match weak.upgrade() {
            Some(listener) => {
                match panic::catch_unwind(AssertUnwindSafe(|| listener.write_batch(&text))) {
                    Ok(Ok(())) => report.written += 1,
                    Ok(Err(e)) => {
                        tracing::warn!("Failed to write log batch to listener: {}", e);
                        report.failed += 1;
                    }
                    Err(_) => {
                        tracing::warn!("Log listener panicked while writing a batch");
                        report.failed += 1;
                    }
                }
            }
            None => {
                let removed = listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(id);
                if removed {
                    report.evicted.push(id);
                }
            }
        }
    }
    report
}

/// Start the flusher thread
///
/// `on_wake` runs once per wake, including the final [`Wake::Stop`] wake after
/// [`FlushSignal::stop`].
pub fn spawn_flusher<F>(signal: Arc<FlushSignal>, mut on_wake: F) -> io::Result<JoinHandle<()>>
where
    F: FnMut(Wake) + Send + 'static,
{
    thread::Builder::new()
        .name("botlog-flusher".into())
        .spawn(move || {
            tracing::debug!("Log flusher started");
            loop {
                let wake = signal.wait();
                on_wake(wake);
                if wake == Wake::Stop {
                    break;
                }
            }
            tracing::debug!("Log flusher stopped");
        })
}

/// Timer thread that fires a callback at a fixed period until dropped
pub struct PeriodicTrigger {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTrigger {
    /// Start calling `callback` every `period`
    pub fn start<F>(period: Duration, callback: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("botlog-periodic".into())
            .spawn(move || {
                let (lock, cond) = &*thread_stop;
                let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
                loop {
                    let (guard, _) = cond
                        .wait_timeout_while(stopped, period, |s| !*s)
                        .unwrap_or_else(PoisonError::into_inner);
                    stopped = guard;
                    if *stopped {
                        break;
                    }
                    callback();
                }
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the timer and wait for its thread to exit
    pub fn stop(&mut self) {
        let (lock, cond) = &*self.stop;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cond.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PeriodicTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::logging::LogListener;
    use std::sync::Weak;
    use std::time::Instant;

    struct PanickingSink;

    impl LogListener for PanickingSink {
        fn write_batch(&self, _text: &str) -> io::Result<()> {
            panic!("sink exploded");
        }
    }

    #[test]
    fn test_signal_collapses_requests() {
        let signal = FlushSignal::new();
        signal.notify();
        signal.notify();
        signal.notify();
        assert_eq!(signal.wait(), Wake::Flush);
        assert!(!signal.lock().requested);
    }

    #[test]
    fn test_signal_stop_wins() {
        let signal = FlushSignal::new();
        signal.notify();
        signal.stop();
        assert_eq!(signal.wait(), Wake::Stop);
        assert!(signal.is_stopping());
        // Once stopping, waiting never blocks again
        assert_eq!(signal.wait(), Wake::Stop);
    }

    #[test]
    fn test_flush_cycle_empty_buffer_is_noop() {
        let pending = PendingBuffer::new();
        let listeners = Mutex::new(ListenerSet::new());
        assert_eq!(flush_cycle(&pending, &listeners), FlushReport::default());
    }

    #[test]
    fn test_flush_cycle_writes_and_evicts() {
        let pending = PendingBuffer::new();
        let listeners = Mutex::new(ListenerSet::new());

        let alive = Arc::new(Mutex::new(Vec::<u8>::new()));
        let dead = Arc::new(Mutex::new(Vec::<u8>::new()));
        {
            let mut set = listeners.lock().unwrap();
            let alive_weak: Weak<Mutex<Vec<u8>>> = Arc::downgrade(&alive);
            let dead_weak: Weak<Mutex<Vec<u8>>> = Arc::downgrade(&dead);
            set.insert(alive_weak);
            set.insert(dead_weak);
        }
        drop(dead);

        pending.append("1,DEBUG,0,,a:b:1,0,,,x;\n");
        let report = flush_cycle(&pending, &listeners);

        assert_eq!(report.written, 1);
        assert_eq!(report.evicted.len(), 1);
        assert_eq!(listeners.lock().unwrap().len(), 1);
        assert!(pending.is_empty());
        assert_eq!(alive.lock().unwrap().as_slice(), b"1,DEBUG,0,,a:b:1,0,,,x;\n");
    }

    #[test]
    fn test_flush_cycle_survives_panicking_sink() {
        let pending = PendingBuffer::new();
        let listeners = Mutex::new(ListenerSet::new());

        let bad = Arc::new(PanickingSink);
        let good = Arc::new(Mutex::new(Vec::<u8>::new()));
        {
            let mut set = listeners.lock().unwrap();
            let bad_weak: Weak<PanickingSink> = Arc::downgrade(&bad);
            let good_weak: Weak<Mutex<Vec<u8>>> = Arc::downgrade(&good);
            set.insert(bad_weak);
            set.insert(good_weak);
        }

        pending.append("first;\n");
        let report = flush_cycle(&pending, &listeners);
        assert_eq!(report.failed, 1);
        assert_eq!(report.written, 1);
        assert!(report.evicted.is_empty());

        pending.append("second;\n");
        let report = flush_cycle(&pending, &listeners);
        assert_eq!(report.failed, 1);
        assert_eq!(good.lock().unwrap().as_slice(), b"first;\nsecond;\n");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_spawn_flusher_runs_final_cycle_on_stop() {
        let signal = Arc::new(FlushSignal::new());
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);

        let last = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&last);

        let handle = spawn_flusher(Arc::clone(&signal), move |wake| {
            counter.fetch_add(1, Ordering::SeqCst);
            *seen.lock().unwrap() = Some(wake);
        })
        .unwrap();

        signal.stop();
        handle.join().unwrap();
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert_eq!(*last.lock().unwrap(), Some(Wake::Stop));
    }

    #[test]
    fn test_periodic_trigger_fires_and_stops() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let mut trigger = PeriodicTrigger::start(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while fired.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        trigger.stop();
        let after_stop = fired.load(Ordering::SeqCst);
        assert!(after_stop >= 2);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(fired.load(Ordering::SeqCst), after_stop);
    }
}

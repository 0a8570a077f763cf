//! Connection monitor watching one socket generation.
//!
//! A [`ConnectionMonitor`] consumes the event source of a single publisher and
//! decides when the socket has been unreachable long enough to replace it. The
//! loop in [`ConnectionMonitor::run`] is synchronous so it can be driven
//! directly; [`ConnectionMonitor::start`] moves it onto a named thread and
//! returns a [`MonitorHandle`] for shutdown.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{debug, info, warn};

use super::transport::{ConnectionEvent, EventSource, Generation};

/// Terminal state of a monitor run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorExit {
    /// A stop flag was observed at a poll boundary.
    Stopped,
    /// The disconnect threshold was reached; the socket must be replaced.
    Reconnect,
    /// The event source failed and cannot be polled again.
    SourceFailed,
}

/// Consecutive closed-event counter.
#[derive(Clone, Debug)]
pub struct RetryCounter {
    count: u32,
    threshold: u32,
}

impl RetryCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Feed one event; returns `true` once the closed streak reaches the
    /// threshold.
    pub fn observe(&mut self, event: ConnectionEvent) -> bool {
        match event {
            ConnectionEvent::Closed => {
                self.count = self.count.saturating_add(1);
                self.count >= self.threshold
            }
            ConnectionEvent::Connected => {
                self.count = 0;
                false
            }
            ConnectionEvent::Other(_) => false,
        }
    }
}

/// Background observer of one publisher's connection events.
pub struct ConnectionMonitor {
    generation: Generation,
    label: String,
    events: Box<dyn EventSource>,
    counter: RetryCounter,
    poll_interval: Duration,
    session_stop: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl ConnectionMonitor {
    /// Create a monitor for `generation`.
    ///
    /// `session_stop` is the session-wide shutdown flag; the monitor also
    /// owns a private flag raised by [`MonitorHandle::stop`].
    pub fn new(
        generation: Generation,
        events: Box<dyn EventSource>,
        poll_interval: Duration,
        threshold: u32,
        session_stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            generation,
            label: String::new(),
            events,
            counter: RetryCounter::new(threshold),
            poll_interval,
            session_stop,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Name used in diagnostics, usually the service identifier.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Current closed-event streak.
    pub fn retry_count(&self) -> u32 {
        self.counter.count()
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire) || self.session_stop.load(Ordering::Acquire)
    }

    /// Poll the event source until a terminal state is reached.
    pub fn run(&mut self) -> MonitorExit {
        loop {
            if self.should_stop() {
                return MonitorExit::Stopped;
            }
            match self.events.next_event(self.poll_interval) {
                Ok(None) => {}
                Ok(Some(event)) => {
                    if self.counter.observe(event) {
                        info!(
                            "zmqlog service {}: {} consecutive closed events on generation {}; reconnecting",
                            self.label,
                            self.counter.count(),
                            self.generation
                        );
                        return MonitorExit::Reconnect;
                    }
                }
                Err(err) => {
                    warn!(
                        "zmqlog service {}: connection monitor for generation {} failed: {err}",
                        self.label, self.generation
                    );
                    return MonitorExit::SourceFailed;
                }
            }
        }
    }

    /// Run the monitor on its own thread.
    ///
    /// `on_exit` runs on the monitor thread after the loop terminates and
    /// receives the generation together with the terminal state.
    pub fn start<F>(mut self, on_exit: F) -> io::Result<MonitorHandle>
    where
        F: FnOnce(Generation, MonitorExit) + Send + 'static,
    {
        let generation = self.generation;
        let stop = Arc::clone(&self.stop);
        let thread = thread::Builder::new()
            .name("zmqlog-monitor".into())
            .spawn(move || {
                let exit = self.run();
                debug!(
                    "zmqlog service {}: monitor for generation {} exited: {exit:?}",
                    self.label, self.generation
                );
                on_exit(self.generation, exit);
                exit
            })?;
        Ok(MonitorHandle {
            generation,
            stop,
            thread: Some(thread),
        })
    }
}

/// Owner of a running monitor thread.
///
/// Dropping the handle raises the stop flag without waiting for the thread.
pub struct MonitorHandle {
    generation: Generation,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<MonitorExit>>,
}

impl MonitorHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether the monitor thread is still polling.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Raise the stop flag and wait for the thread to exit.
    ///
    /// Returns `None` if the monitor was already joined or panicked.
    pub fn stop(&mut self) -> Option<MonitorExit> {
        self.stop.store(true, Ordering::Release);
        self.join()
    }

    /// Wait for the thread to exit without requesting it.
    pub fn join(&mut self) -> Option<MonitorExit> {
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                warn!("zmqlog: monitor thread for generation {} panicked", self.generation);
                None
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("generation", &self.generation)
            .field("running", &self.is_running())
            .finish()
    }
}

//! In-memory transport recording every socket it opens.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::publisher::{Connection, Generation, Publisher, Transport, TransportError};

use super::scripted_events::{EventFeed, scripted_events};

/// Observable state of one fake socket.
#[derive(Clone, Debug, Default)]
pub struct SocketLog {
    pub sent: Vec<Vec<Vec<u8>>>,
    pub linger: Option<Duration>,
    pub closed: bool,
}

/// A socket opened through [`FakeTransport`].
#[derive(Clone, Debug)]
pub struct FakeSocket {
    pub address: String,
    pub generation: Generation,
    pub feed: EventFeed,
    log: Arc<Mutex<SocketLog>>,
}

impl FakeSocket {
    /// Messages sent so far, each as its list of frames.
    pub fn sent(&self) -> Vec<Vec<Vec<u8>>> {
        self.log.lock().sent.clone()
    }

    pub fn linger(&self) -> Option<Duration> {
        self.log.lock().linger
    }

    pub fn is_closed(&self) -> bool {
        self.log.lock().closed
    }
}

#[derive(Default)]
struct FakeState {
    sockets: Vec<FakeSocket>,
    failing_opens: usize,
    attempts: usize,
}

/// [`Transport`] double handing out scripted sockets.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
    fail_sends: Arc<AtomicBool>,
    send_calls: Arc<AtomicUsize>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `open` fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().failing_opens = count;
    }

    /// Make every publisher reject sends while `fail` is set.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Successfully opened sockets, oldest first.
    pub fn sockets(&self) -> Vec<FakeSocket> {
        self.state.lock().sockets.clone()
    }

    pub fn socket(&self, index: usize) -> Option<FakeSocket> {
        self.state.lock().sockets.get(index).cloned()
    }

    /// Calls to `open`, including failed ones.
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts
    }

    /// Calls to `send_frames` across all publishers.
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` sockets were opened successfully.
    pub fn wait_for_sockets(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.state.lock().sockets.len() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.state.lock().sockets.len() >= count
    }
}

impl Transport for FakeTransport {
    fn open(&self, address: &str, generation: Generation) -> Result<Connection, TransportError> {
        let mut state = self.state.lock();
        state.attempts += 1;
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(TransportError::Other(format!("refused to open {address}")));
        }
        let (feed, events) = scripted_events();
        let log = Arc::new(Mutex::new(SocketLog::default()));
        state.sockets.push(FakeSocket {
            address: address.to_owned(),
            generation,
            feed,
            log: Arc::clone(&log),
        });
        Ok(Connection {
            publisher: Box::new(FakePublisher {
                log,
                fail_sends: Arc::clone(&self.fail_sends),
                send_calls: Arc::clone(&self.send_calls),
            }),
            events: Box::new(events),
        })
    }
}

struct FakePublisher {
    log: Arc<Mutex<SocketLog>>,
    fail_sends: Arc<AtomicBool>,
    send_calls: Arc<AtomicUsize>,
}

impl Publisher for FakePublisher {
    fn send_frames(&mut self, frames: &[&[u8]]) -> Result<(), TransportError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Other("send rejected".into()));
        }
        let mut log = self.log.lock();
        if log.closed {
            return Err(TransportError::Closed);
        }
        log.sent.push(frames.iter().map(|frame| frame.to_vec()).collect());
        Ok(())
    }

    fn set_linger(&mut self, linger: Duration) -> Result<(), TransportError> {
        self.log.lock().linger = Some(linger);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), TransportError> {
        self.log.lock().closed = true;
        Ok(())
    }
}

//! Socket replacement after sustained disconnection.

use std::{
    io,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use log::{error, info, warn};
use thiserror::Error;

use super::{
    backoff::BackoffState,
    session::{SessionShared, SessionState},
    transport::{Generation, TransportError},
};

/// Errors reported by a reconnect sequence.
#[derive(Debug, Error)]
pub enum ReconnectError {
    #[error("session is stopped")]
    Stopped,
    /// Another reconnect already installed a newer socket.
    #[error("reconnect superseded by generation {current}")]
    Superseded { current: Generation },
    #[error("failed to connect publisher to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to start connection monitor: {0}")]
    Monitor(#[source] io::Error),
    #[error("gave up reconnecting after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

impl ReconnectError {
    /// Whether another attempt could succeed.
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Monitor(_))
    }
}

/// Replaces the socket of one session.
///
/// Each attempt runs entirely under the session guard, so it never overlaps
/// a send or another attempt. Between failed attempts the guard is released
/// and the coordinator sleeps according to the session's backoff policy.
pub(crate) struct ReconnectCoordinator {
    shared: Arc<SessionShared>,
    trigger: Generation,
}

impl ReconnectCoordinator {
    /// `trigger` is the generation whose socket is being replaced.
    pub(crate) fn new(shared: Arc<SessionShared>, trigger: Generation) -> Self {
        Self { shared, trigger }
    }

    /// Run the coordinator on its own thread.
    pub(crate) fn spawn(shared: Arc<SessionShared>, trigger: Generation) {
        let coordinator = Self::new(shared, trigger);
        let spawned = thread::Builder::new()
            .name("zmqlog-reconnect".into())
            .spawn(move || {
                // Outcomes are logged by `run`.
                let _ = coordinator.run();
            });
        if let Err(err) = spawned {
            error!("zmqlog: failed to spawn reconnect thread for generation {trigger}: {err}");
        }
    }

    /// Attempt replacement until it succeeds, becomes pointless, or the
    /// backoff deadline passes.
    pub(crate) fn run(&self) -> Result<Generation, ReconnectError> {
        let service_id = self.shared.identity.service_id().to_owned();
        let mut backoff = BackoffState::new(self.shared.config.backoff.clone());
        loop {
            let now = Instant::now();
            let err = match self.attempt() {
                Ok(generation) => return Ok(generation),
                Err(err) if err.is_retryable() => err,
                Err(err) => {
                    info!("zmqlog service {service_id}: reconnect abandoned: {err}");
                    return Err(err);
                }
            };
            warn!("zmqlog service {service_id}: reconnect attempt failed: {err}");
            let Some(delay) = backoff.next_sleep(now) else {
                let attempts = backoff.attempts();
                error!(
                    "zmqlog service {service_id}: gave up reconnecting after {attempts} attempts; session left without a socket"
                );
                return Err(ReconnectError::Exhausted { attempts });
            };
            if self.sleep_unless_stopped(delay) {
                return Err(ReconnectError::Stopped);
            }
        }
    }

    fn sleep_unless_stopped(&self, delay: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(50);
        let deadline = Instant::now() + delay;
        loop {
            if self.shared.is_stopped() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            thread::sleep(remaining.min(SLICE));
        }
    }

    fn attempt(&self) -> Result<Generation, ReconnectError> {
        let mut state = self.shared.guard.lock();
        if self.shared.is_stopped() {
            return Err(ReconnectError::Stopped);
        }
        if state.generation != self.trigger {
            return Err(ReconnectError::Superseded {
                current: state.generation,
            });
        }
        self.replace(&mut state)
    }

    fn replace(&self, state: &mut SessionState) -> Result<Generation, ReconnectError> {
        let shared = &self.shared;
        let service_id = shared.identity.service_id();

        if let Some(mut monitor) = state.monitor.take() {
            monitor.stop();
        }
        if let Some(old) = state.channel.take() {
            info!(
                "zmqlog service {service_id}: closing socket to {} (generation {})",
                old.address(),
                old.generation()
            );
            if let Err(err) = old.close(shared.config.reconnect_linger) {
                error!("zmqlog service {service_id}: failed to close old socket: {err}");
            }
        }

        let address = shared.address_source.resolve(service_id);
        info!("zmqlog service {service_id}: reconnecting to {address}");
        let (channel, events) = shared.open_channel(&address).map_err(|source| {
            ReconnectError::Connect {
                address: address.clone(),
                source,
            }
        })?;
        let generation = channel.generation();
        let monitor = match SessionShared::start_monitor(shared, generation, events) {
            Ok(monitor) => monitor,
            Err(err) => {
                if let Err(close_err) = channel.close(shared.config.reconnect_linger) {
                    warn!("zmqlog service {service_id}: failed to close unmonitored socket: {close_err}");
                }
                return Err(ReconnectError::Monitor(err));
            }
        };

        state.address = address;
        state.generation = generation;
        state.channel = Some(channel);
        state.monitor = Some(monitor);
        info!(
            "zmqlog service {service_id}: reconnected to {} (generation {generation})",
            state.address
        );
        Ok(generation)
    }
}

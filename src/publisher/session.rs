//! Publishing session: identity, current socket and its monitor.

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    discovery::AddressResolver,
    driver::{DriverError, LogDriver},
    identity::Identity,
    message::LogMessage,
    options::{DRIVER_NAME, OptionError, address_override, validate_log_opts},
    rate_limited_warner::RateLimitedWarner,
};

use super::{
    channel::PublishChannel,
    config::ZmqLogConfig,
    monitor::{ConnectionMonitor, MonitorExit, MonitorHandle},
    reconnect::{ReconnectCoordinator, ReconnectError},
    transport::{EventSource, Generation, Transport, TransportError},
};

/// Errors raised while opening or closing a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Options(#[from] OptionError),
    #[error("failed to connect publisher to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to start connection monitor: {0}")]
    Monitor(#[source] io::Error),
    #[error("failed to close publisher: {0}")]
    Close(#[source] TransportError),
}

/// Where the server address comes from.
pub(crate) enum AddressSource {
    /// Configured through `zmq-address`; reused verbatim on every reconnect.
    Pinned(String),
    Discover(Arc<dyn AddressResolver>),
}

impl AddressSource {
    pub(crate) fn resolve(&self, service_id: &str) -> String {
        match self {
            AddressSource::Pinned(address) => address.clone(),
            AddressSource::Discover(resolver) => resolver.resolve(service_id),
        }
    }
}

/// Mutable connection state, only touched under the session guard.
pub(crate) struct SessionState {
    pub(crate) channel: Option<PublishChannel>,
    pub(crate) address: String,
    pub(crate) generation: Generation,
    pub(crate) monitor: Option<MonitorHandle>,
}

pub(crate) struct SessionShared {
    pub(crate) identity: Identity,
    pub(crate) config: ZmqLogConfig,
    pub(crate) address_source: AddressSource,
    transport: Arc<dyn Transport>,
    stop: Arc<AtomicBool>,
    /// Serialises every send, close and socket replacement.
    pub(crate) guard: Mutex<SessionState>,
    warner: RateLimitedWarner,
}

impl SessionShared {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub(crate) fn open_channel(
        &self,
        address: &str,
    ) -> Result<(PublishChannel, Box<dyn EventSource>), TransportError> {
        PublishChannel::open(self.transport.as_ref(), address)
    }

    /// Start the monitor for `generation`. A monitor that reaches the
    /// disconnect threshold hands over to a [`ReconnectCoordinator`].
    pub(crate) fn start_monitor(
        shared: &Arc<Self>,
        generation: Generation,
        events: Box<dyn EventSource>,
    ) -> io::Result<MonitorHandle> {
        let session = Arc::downgrade(shared);
        ConnectionMonitor::new(
            generation,
            events,
            shared.config.poll_interval,
            shared.config.disconnect_threshold,
            Arc::clone(&shared.stop),
        )
        .with_label(shared.identity.service_id())
        .start(move |generation, exit| {
            if exit != MonitorExit::Reconnect {
                return;
            }
            if let Some(shared) = session.upgrade() {
                ReconnectCoordinator::spawn(shared, generation);
            }
        })
    }

    fn record_drop(&self, reason: &dyn std::fmt::Display) {
        self.warner.record_drop();
        self.warner.warn_if_due(|count| {
            warn!(
                "zmqlog service {}: dropped {count} log messages ({reason})",
                self.identity.service_id()
            );
        });
    }
}

/// One logging stream publishing to the log server.
///
/// All sends, the close and every socket replacement run under one guard, so
/// a message is never written to a socket that is being swapped out.
pub struct Session {
    shared: Arc<SessionShared>,
}

impl Session {
    /// Open a session: validate options, pick the address, connect the
    /// publisher and start its monitor.
    ///
    /// A connection failure here is returned to the caller; later failures
    /// are handled by the monitor and reconnect machinery.
    pub fn open(
        identity: Identity,
        opts: &HashMap<String, String>,
        config: ZmqLogConfig,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn AddressResolver>,
    ) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::InvalidConfig)?;
        validate_log_opts(opts, config.variant)?;

        let address_source = match address_override(opts) {
            Some(address) => AddressSource::Pinned(address.to_owned()),
            None => AddressSource::Discover(resolver),
        };
        let address = address_source.resolve(identity.service_id());
        info!(
            "zmqlog service {}: using log server {address}",
            identity.service_id()
        );

        let (channel, events) = PublishChannel::open(transport.as_ref(), &address)
            .map_err(|source| SessionError::Connect {
                address: address.clone(),
                source,
            })?;
        let generation = channel.generation();
        let warner = RateLimitedWarner::new(config.warn_interval);
        let shared = Arc::new(SessionShared {
            identity,
            config,
            address_source,
            transport,
            stop: Arc::new(AtomicBool::new(false)),
            guard: Mutex::new(SessionState {
                channel: Some(channel),
                address,
                generation,
                monitor: None,
            }),
            warner,
        });

        {
            let mut state = shared.guard.lock();
            match SessionShared::start_monitor(&shared, generation, events) {
                Ok(monitor) => state.monitor = Some(monitor),
                Err(err) => {
                    shared.stop.store(true, Ordering::Release);
                    if let Some(channel) = state.channel.take() {
                        let _ = channel.close(shared.config.close_linger);
                    }
                    return Err(SessionError::Monitor(err));
                }
            }
        }
        Ok(Self { shared })
    }

    pub fn identity(&self) -> &Identity {
        &self.shared.identity
    }

    pub fn config(&self) -> &ZmqLogConfig {
        &self.shared.config
    }

    /// Address of the current (or last attempted) server.
    pub fn address(&self) -> String {
        self.shared.guard.lock().address.clone()
    }

    /// Generation of the current socket.
    pub fn generation(&self) -> Generation {
        self.shared.guard.lock().generation
    }

    /// Generation of the running monitor, if one is running.
    pub fn monitor_generation(&self) -> Option<Generation> {
        let state = self.shared.guard.lock();
        state
            .monitor
            .as_ref()
            .filter(|monitor| monitor.is_running())
            .map(MonitorHandle::generation)
    }

    /// Whether a monitor is currently watching the socket.
    pub fn is_monitored(&self) -> bool {
        self.monitor_generation().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Publish one log line.
    ///
    /// Never blocks on the network and never fails: send errors and the
    /// absence of a socket are logged (rate limited) and the line is dropped.
    pub fn send(&self, line: &[u8]) {
        let shared = &self.shared;
        let payload = shared.identity.payload(line);
        let routing = shared
            .config
            .variant
            .routing_frames(shared.identity.tenant_id(), shared.identity.service_id());

        let mut state = shared.guard.lock();
        let result = match state.channel.as_mut() {
            Some(channel) => channel.send(&routing, &payload),
            None => Err(TransportError::Closed),
        };
        drop(state);
        if let Err(err) = result {
            shared.record_drop(&err);
        }
    }

    /// Replace the socket now, regardless of monitor state.
    ///
    /// Re-arms a session left without a socket after an exhausted reconnect
    /// sequence.
    pub fn reconnect(&self) -> Result<Generation, ReconnectError> {
        if self.shared.is_stopped() {
            return Err(ReconnectError::Stopped);
        }
        let trigger = self.generation();
        ReconnectCoordinator::new(Arc::clone(&self.shared), trigger).run()
    }

    /// Stop the session: raise the stop flag, close the socket with a short
    /// linger and wait for the monitor to exit.
    ///
    /// Calling `close` again is a no-op.
    pub fn close(&self) -> Result<(), SessionError> {
        let shared = &self.shared;
        let (result, monitor) = {
            let mut state = shared.guard.lock();
            shared.stop.store(true, Ordering::Release);
            let result = match state.channel.take() {
                Some(channel) => channel
                    .close(shared.config.close_linger)
                    .map_err(SessionError::Close),
                None => Ok(()),
            };
            (result, state.monitor.take())
        };
        if let Some(mut monitor) = monitor {
            monitor.stop();
        }
        shared.warner.flush(|count| {
            warn!(
                "zmqlog service {}: dropped {count} log messages before close",
                shared.identity.service_id()
            );
        });
        result
    }
}

impl LogDriver for Session {
    fn log(&self, message: &LogMessage) -> Result<(), DriverError> {
        self.send(&message.line);
        Ok(())
    }

    fn close(&self) -> Result<(), DriverError> {
        Session::close(self).map_err(DriverError::from)
    }

    fn name(&self) -> &'static str {
        DRIVER_NAME
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("zmqlog: error closing session on drop: {err}");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.shared.identity)
            .field("variant", &self.shared.config.variant)
            .field("closed", &self.is_closed())
            .finish()
    }
}

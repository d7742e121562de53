//! Session context and tick driver.
//!
//! A [`Context`] owns every session plus the scratch buffer used while
//! draining ARQ engines. All work happens on the thread that owns the
//! context: transports are polled or fed through
//! [`on_datagram`](Context::on_datagram), and [`tick`](Context::tick)
//! is called once per timer interval.

use std::net::SocketAddr;
use std::time::Instant;

use tracing::{debug, info};

use super::{Registry, Session, SessionId};
use crate::arq::{Arq, KcpArq};
use crate::core::{BUFFER_LEN, ContextConfig, SessionError, SessionResult, UDP_RECV_BUFFER_SIZE};
use crate::transport::Transport;

/// Owner of all sessions and the tick driver.
#[derive(Debug)]
pub struct Context {
    config: ContextConfig,
    registry: Registry,
    /// Decode buffer shared by every session during a tick.
    scratch: Vec<u8>,
    /// Receive buffer for transport polling.
    inbound: Vec<u8>,
    initialized: bool,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

impl Context {
    /// Create an uninitialized context.
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            scratch: Vec::new(),
            inbound: Vec::new(),
            initialized: false,
        }
    }

    /// Allocate shared buffers. Calling it again is a no-op.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.scratch = Vec::with_capacity(BUFFER_LEN);
        self.inbound = vec![0u8; UDP_RECV_BUFFER_SIZE];
        self.initialized = true;
        debug!("context initialized");
    }

    /// Whether [`initialize`](Self::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Drop every registered session without running close handlers.
    ///
    /// Returns how many sessions were dropped. Calling it again is a no-op.
    pub fn teardown(&mut self) -> usize {
        if !self.initialized {
            return 0;
        }
        let dropped = self.registry.drain().len();
        self.scratch = Vec::new();
        self.inbound = Vec::new();
        self.initialized = false;
        info!(dropped, "context torn down");
        dropped
    }

    /// Context configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Turn the inactivity timeout on or off for every session.
    pub fn set_timeout_enforcement(&mut self, enforce: bool) {
        self.config.enforce_timeout = enforce;
    }

    /// Whether inactivity timeouts are enforced.
    pub fn timeout_enforced(&self) -> bool {
        self.config.enforce_timeout
    }

    /// Create a session over `transport` with the default ARQ engine.
    pub fn create<T>(&mut self, transport: T) -> SessionId
    where
        T: Transport + 'static,
    {
        self.create_at(transport, Instant::now())
    }

    /// [`create`](Self::create) with timestamps starting at `now`.
    pub fn create_at<T>(&mut self, transport: T, now: Instant) -> SessionId
    where
        T: Transport + 'static,
    {
        let arq = KcpArq::from_config(&self.config.session);
        self.create_with_at(transport, arq, now)
    }

    /// Create a session over `transport` driven by `arq`.
    pub fn create_with<T, A>(&mut self, transport: T, arq: A) -> SessionId
    where
        T: Transport + 'static,
        A: Arq + 'static,
    {
        self.create_with_at(transport, arq, Instant::now())
    }

    /// [`create_with`](Self::create_with) with timestamps starting at `now`.
    pub fn create_with_at<T, A>(&mut self, transport: T, arq: A, now: Instant) -> SessionId
    where
        T: Transport + 'static,
        A: Arq + 'static,
    {
        self.initialize();

        let config = &self.config.session;
        let id = self.registry.insert_with(|id| {
            Session::new(id, Box::new(transport), Box::new(arq), config, now)
        });
        debug!(session = %id, sessions = self.registry.len(), "session created");
        id
    }

    /// Look up a session.
    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.registry.get(id)
    }

    /// Look up a session mutably.
    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.registry.get_mut(id)
    }

    /// Remove and drop a session without running its close handlers.
    pub fn destroy(&mut self, id: SessionId) -> bool {
        let destroyed = self.registry.remove(id).is_some();
        if destroyed {
            debug!(session = %id, "session destroyed");
        }
        destroyed
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Handles of all registered sessions in registry order.
    pub fn ids(&self) -> Vec<SessionId> {
        self.registry.ids()
    }

    /// Deliver one datagram received for `id`.
    pub fn on_datagram(&mut self, id: SessionId, from: SocketAddr, datagram: &[u8]) -> SessionResult<()> {
        self.on_datagram_at(id, from, datagram, Instant::now())
    }

    /// Deliver one datagram received for `id` at `now`.
    pub fn on_datagram_at(
        &mut self,
        id: SessionId,
        from: SocketAddr,
        datagram: &[u8],
        now: Instant,
    ) -> SessionResult<()> {
        let session = self.registry.get_mut(id).ok_or(SessionError::UnknownSession)?;
        session.input(from, datagram, now);
        Ok(())
    }

    /// Poll every session's transport and feed what arrived.
    ///
    /// Returns the number of datagrams processed.
    pub fn poll_inbound(&mut self, now: Instant) -> usize {
        self.initialize();

        let mut count = 0;
        for id in self.registry.ids() {
            if let Some(session) = self.registry.get_mut(id) {
                count += session.poll_transport(&mut self.inbound, now);
            }
        }
        count
    }

    /// Run one timer tick over every session.
    ///
    /// Returns the number of sessions finalized during this tick.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.initialize();

        let mut finalized = 0;

        for id in self.registry.ids() {
            let timed_out = self.config.enforce_timeout
                && self.registry.get(id).is_some_and(|s| s.is_timed_out(now));
            if timed_out {
                debug!(session = %id, "session timed out");
                finalized += usize::from(self.finalize(id));
                continue;
            }

            if let Some(session) = self.registry.get_mut(id) {
                session.update(now, &mut self.scratch);
            }
        }

        for id in self.registry.ids() {
            let Some(session) = self.registry.get_mut(id) else {
                continue;
            };

            if session.is_drained() {
                finalized += usize::from(self.finalize(id));
            } else if self.config.heartbeat && session.needs_heartbeat(now, self.config.heartbeat_interval) {
                session.heartbeat(now);
            }
        }

        finalized
    }

    /// Remove `id` and run its close handlers.
    fn finalize(&mut self, id: SessionId) -> bool {
        match self.registry.remove(id) {
            Some(session) => {
                session.finalize();
                true
            }
            None => false,
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.teardown();
    }
}

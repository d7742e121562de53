//! The session entity.
//!
//! A session glues one transport, one ARQ engine and an optional cipher
//! together, and runs the command protocol on top of the engine's ordered
//! message stream. Sessions are owned by a [`Context`](super::Context);
//! applications reach them through a [`SessionId`].

use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use super::{RecvBuffer, SessionId, SessionState};
use crate::arq::Arq;
use crate::core::{CryptoError, SessionConfig, SessionError, SessionResult};
#[cfg(feature = "crypto")]
use crate::crypto::SessionCipher;
use crate::transport::{self, ChunkHeader, Command, Transport, decode_chunk, encode_chunk, split_payload};

/// Handler for reassembled application data.
pub type MessageHandler = Box<dyn FnMut(&mut Session, &[u8])>;

/// Handler run right before the close handler.
pub type BeforeCloseHandler = Box<dyn FnOnce(&mut Session)>;

/// Handler that receives the finished session and owns its release.
pub type CloseHandler = Box<dyn FnOnce(Session)>;

/// One reliable, ordered, optionally encrypted connection.
pub struct Session {
    id: SessionId,
    state: SessionState,

    transport: Box<dyn Transport>,
    arq: Box<dyn Arq>,
    #[cfg(feature = "crypto")]
    cipher: Option<SessionCipher>,

    recv_buf: RecvBuffer,
    recv_ts: Instant,
    send_ts: Instant,
    timeout: Duration,

    /// Next chunk header nonce.
    nonce: u64,

    on_message: Option<MessageHandler>,
    on_before_close: Option<BeforeCloseHandler>,
    on_close: Option<CloseHandler>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("remote", &self.transport.remote())
            .field("buffered", &self.recv_buf.len())
            .field("unacked", &self.arq.pending_unacked())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        transport: Box<dyn Transport>,
        arq: Box<dyn Arq>,
        config: &SessionConfig,
        now: Instant,
    ) -> Self {
        Self {
            id,
            state: SessionState::Created,
            transport,
            arq,
            #[cfg(feature = "crypto")]
            cipher: None,
            recv_buf: RecvBuffer::with_capacity(config.buffer_size),
            recv_ts: now,
            send_ts: now,
            timeout: config.timeout,
            nonce: 0,
            on_message: None,
            on_before_close: None,
            on_close: None,
        }
    }

    /// Handle of this session in its context.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last time an inbound datagram was accepted.
    pub fn recv_ts(&self) -> Instant {
        self.recv_ts
    }

    /// Last time a command was submitted for sending.
    pub fn send_ts(&self) -> Instant {
        self.send_ts
    }

    /// Inactivity budget (`Duration::ZERO` means none).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Override the inactivity budget.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Outbound segments the peer has not acknowledged yet.
    pub fn pending_unacked(&self) -> usize {
        self.arq.pending_unacked()
    }

    /// Bytes waiting in the reassembly buffer.
    pub fn buffered(&self) -> usize {
        self.recv_buf.len()
    }

    /// Peer address, if known.
    pub fn remote(&self) -> Option<SocketAddr> {
        self.transport.remote()
    }

    /// Local address, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    /// Bind `port` and wait for a peer to speak first.
    pub fn listen<F>(&mut self, port: u16, on_message: F) -> SessionResult<()>
    where
        F: FnMut(&mut Session, &[u8]) + 'static,
    {
        if self.state != SessionState::Created {
            return Err(SessionError::InvalidState(self.state));
        }

        self.transport.bind(port)?;
        self.on_message = Some(Box::new(on_message));
        self.state.advance_to(SessionState::WaitPassively);
        debug!(session = %self.id, local = ?self.transport.local_addr(), "listening");
        Ok(())
    }

    /// Point the session at `host:port`.
    ///
    /// The session becomes `Ready` once the peer's first datagram arrives.
    pub fn initiate(&mut self, host: &str, port: u16) -> SessionResult<()> {
        if self.state != SessionState::Created {
            return Err(SessionError::InvalidState(self.state));
        }

        let addr = transport::resolve(host, port)?;
        self.transport.set_remote(addr);
        debug!(session = %self.id, remote = %addr, "initiated");
        Ok(())
    }

    /// Register the handler for reassembled data.
    pub fn bind_message<F>(&mut self, on_message: F)
    where
        F: FnMut(&mut Session, &[u8]) + 'static,
    {
        self.on_message = Some(Box::new(on_message));
    }

    /// Register the close handler.
    ///
    /// It runs exactly once, with the session moved in.
    pub fn bind_close<F>(&mut self, on_close: F)
    where
        F: FnOnce(Session) + 'static,
    {
        self.on_close = Some(Box::new(on_close));
    }

    /// Register a handler that runs right before the close handler.
    pub fn set_before_close<F>(&mut self, on_before_close: F)
    where
        F: FnOnce(&mut Session) + 'static,
    {
        self.on_before_close = Some(Box::new(on_before_close));
    }

    /// Derive the datagram cipher from `key`.
    #[cfg(feature = "crypto")]
    pub fn init_crypto(&mut self, key: &[u8]) -> SessionResult<()> {
        self.cipher = Some(SessionCipher::new(key)?);
        debug!(session = %self.id, "crypto initialized");
        Ok(())
    }

    /// Whether datagrams are encrypted.
    #[cfg(feature = "crypto")]
    pub fn has_crypto(&self) -> bool {
        self.cipher.is_some()
    }

    /// Queue application data for reliable delivery.
    ///
    /// Delivery is best effort from the caller's side: refusals and
    /// engine errors are logged, not returned.
    pub fn send(&mut self, data: &[u8]) {
        self.send_at(data, Instant::now());
    }

    /// [`send`](Self::send) stamped with the caller's clock.
    pub fn send_at(&mut self, data: &[u8], now: Instant) {
        if !self.transport.has_remote() {
            warn!(session = %self.id, state = %self.state, "send without remote address dropped");
            return;
        }
        self.raw_send(Command::Push, data, now);
    }

    /// Start a graceful close.
    ///
    /// A session with a known peer sends `FIN` and waits for `FIN_ACK`.
    /// One without a peer has nobody to shake hands with and goes
    /// straight to `FinAck`.
    pub fn close(&mut self) {
        self.close_at(Instant::now());
    }

    /// [`close`](Self::close) stamped with the caller's clock.
    pub fn close_at(&mut self, now: Instant) {
        match self.state {
            SessionState::Created | SessionState::Ready if self.transport.has_remote() => {
                self.state.advance_to(SessionState::Fin);
                self.raw_send(Command::Fin, &[], now);
                debug!(session = %self.id, "close requested");
            }
            SessionState::Created | SessionState::WaitPassively => {
                self.state.advance_to(SessionState::FinAck);
                debug!(session = %self.id, "closed before handshake");
            }
            state => trace!(session = %self.id, %state, "close ignored"),
        }
    }

    /// Process one datagram from the transport.
    ///
    /// A closing session keeps feeding its engine so outstanding
    /// acknowledgments still land, but nothing reaches the application.
    pub(crate) fn input(&mut self, from: SocketAddr, datagram: &[u8], now: Instant) {
        if !self.state.can_transmit() {
            debug!(session = %self.id, state = %self.state, %from, "input refused");
            return;
        }

        if let Err(err) = self.ingest(datagram) {
            if err.is_silent_drop() {
                debug!(session = %self.id, %from, %err, "dropping datagram");
            } else {
                warn!(session = %self.id, %from, %err, "datagram rejected");
            }
            return;
        }

        if !self.state.accepts_input() {
            trace!(session = %self.id, state = %self.state, "engine-only input while closing");
            return;
        }

        if self.state.awaits_peer() {
            if !self.transport.has_remote() {
                self.transport.set_remote(from);
            }
            self.state.advance_to(SessionState::Ready);
            debug!(session = %self.id, remote = %from, "session ready");
        }
        self.recv_ts = now;
    }

    /// Drain the transport and feed every pending datagram.
    pub(crate) fn poll_transport(&mut self, buf: &mut [u8], now: Instant) -> usize {
        let mut count = 0;
        loop {
            match self.transport.poll_recv(buf) {
                Ok(Some((len, from))) => {
                    self.input(from, &buf[..len], now);
                    count += 1;
                }
                Ok(None) => return count,
                Err(err) => {
                    if !err.is_silent_drop() {
                        warn!(session = %self.id, %err, "transport receive failed");
                    }
                    return count;
                }
            }
        }
    }

    /// Run the engine and dispatch everything it has reassembled.
    pub(crate) fn update(&mut self, now: Instant, scratch: &mut Vec<u8>) {
        if self.arq.poll_due_time(now) <= now {
            self.arq.advance(now);
            self.flush_output();
        }

        while self.arq.drain(scratch).is_some() {
            if self.state.accepts_input() {
                if let Err(err) = self.dispatch(&scratch[..], now) {
                    warn!(session = %self.id, state = %self.state, %err, "discarding chunk");
                }
            } else {
                trace!(session = %self.id, state = %self.state, len = scratch.len(), "discarding chunk after close");
            }
        }

        if !self.recv_buf.is_empty() {
            let data = self.recv_buf.take();
            self.deliver(&data);
        }
    }

    /// Whether the session went quiet for longer than its budget.
    pub(crate) fn is_timed_out(&self, now: Instant) -> bool {
        !self.timeout.is_zero() && now.saturating_duration_since(self.recv_ts) >= self.timeout
    }

    /// Whether an agreed close has nothing left in flight.
    pub(crate) fn is_drained(&self) -> bool {
        self.state == SessionState::FinAck && self.arq.pending_unacked() == 0
    }

    /// Whether an idle keepalive is due.
    pub(crate) fn needs_heartbeat(&self, now: Instant, interval: Duration) -> bool {
        self.state == SessionState::Ready
            && self.transport.has_remote()
            && self.arq.pending_unacked() == 0
            && self.send_ts + interval <= now
    }

    pub(crate) fn heartbeat(&mut self, now: Instant) {
        trace!(session = %self.id, "heartbeat");
        self.raw_send(Command::Noo, &[], now);
    }

    /// Run the close handlers; the session is gone afterwards.
    pub(crate) fn finalize(mut self) {
        self.state.advance_to(SessionState::WaitFree);
        debug!(session = %self.id, "session finalized");

        if let Some(before_close) = self.on_before_close.take() {
            before_close(&mut self);
        }
        if let Some(on_close) = self.on_close.take() {
            on_close(self);
        }
    }

    /// Decrypt a datagram and hand it to the engine.
    fn ingest(&mut self, datagram: &[u8]) -> SessionResult<()> {
        let plain = self.open(datagram)?;
        self.arq.feed(&plain)?;
        Ok(())
    }

    fn dispatch(&mut self, chunk: &[u8], now: Instant) -> SessionResult<()> {
        let (header, payload) = decode_chunk(chunk)?;

        match header.command {
            Command::Noo => trace!(session = %self.id, "keepalive"),
            Command::Push => {
                if let Some(flushed) = self.recv_buf.push(payload) {
                    self.deliver(&flushed);
                }
            }
            Command::Fin => {
                if self.state.answers_fin() {
                    self.state.advance_to(SessionState::FinAck);
                    self.raw_send(Command::FinAck, &[], now);
                    debug!(session = %self.id, "peer requested close");
                } else {
                    trace!(session = %self.id, state = %self.state, "duplicate FIN");
                }
            }
            Command::FinAck => {
                if self.state.advance_to(SessionState::FinAck) {
                    debug!(session = %self.id, "peer acknowledged close");
                }
            }
        }
        Ok(())
    }

    fn deliver(&mut self, data: &[u8]) {
        let Some(mut on_message) = self.on_message.take() else {
            debug!(session = %self.id, len = data.len(), "no message handler, data discarded");
            return;
        };

        on_message(self, data);
        if self.on_message.is_none() {
            self.on_message = Some(on_message);
        }
    }

    /// Frame `payload` as `command` chunks and hand them to the engine.
    fn raw_send(&mut self, command: Command, payload: &[u8], now: Instant) {
        let allowed = match command {
            Command::FinAck => self.state.can_transmit(),
            _ => self.state.is_sendable(),
        };
        if !allowed {
            warn!(session = %self.id, state = %self.state, ?command, "send refused");
            return;
        }

        self.send_ts = now;
        for part in split_payload(payload) {
            let header = ChunkHeader::new(self.nonce, command);
            self.nonce = self.nonce.wrapping_add(1);

            if let Err(err) = self.submit_chunk(header, part) {
                warn!(session = %self.id, ?command, %err, "chunk submit failed");
            }
        }
    }

    fn submit_chunk(&mut self, header: ChunkHeader, part: &[u8]) -> SessionResult<()> {
        self.arq.submit(&encode_chunk(header, part))?;
        Ok(())
    }

    /// Encrypt and send every datagram the engine produced.
    fn flush_output(&mut self) {
        while let Some(datagram) = self.arq.poll_transmit() {
            if !self.state.can_transmit() {
                continue;
            }

            let sealed = match self.seal(&datagram) {
                Ok(sealed) => sealed,
                Err(err) => {
                    warn!(session = %self.id, %err, "datagram encryption failed");
                    continue;
                }
            };

            if let Err(err) = self.transport.send(&sealed) {
                if err.is_silent_drop() {
                    trace!(session = %self.id, %err, "datagram dropped");
                } else if err.is_fatal() {
                    error!(session = %self.id, state = %self.state, %err, "transport unusable");
                } else {
                    warn!(session = %self.id, %err, "transport send failed");
                }
            }
        }
    }

    #[cfg(feature = "crypto")]
    fn seal<'a>(&self, datagram: &'a [u8]) -> Result<Cow<'a, [u8]>, CryptoError> {
        match &self.cipher {
            Some(cipher) => cipher.encrypt(datagram).map(Cow::Owned),
            None => Ok(Cow::Borrowed(datagram)),
        }
    }

    #[cfg(feature = "crypto")]
    fn open<'a>(&self, datagram: &'a [u8]) -> Result<Cow<'a, [u8]>, CryptoError> {
        match &self.cipher {
            Some(cipher) => cipher.decrypt(datagram).map(Cow::Owned),
            None => Ok(Cow::Borrowed(datagram)),
        }
    }

    #[cfg(not(feature = "crypto"))]
    fn seal<'a>(&self, datagram: &'a [u8]) -> Result<Cow<'a, [u8]>, CryptoError> {
        Ok(Cow::Borrowed(datagram))
    }

    #[cfg(not(feature = "crypto"))]
    fn open<'a>(&self, datagram: &'a [u8]) -> Result<Cow<'a, [u8]>, CryptoError> {
        Ok(Cow::Borrowed(datagram))
    }
}

//! ARQ engine seam.
//!
//! The session layer never retransmits anything itself. It hands framed
//! chunks to an [`Arq`] implementation, feeds it decrypted datagrams, and
//! collects whole chunks back out of it in order. Output datagrams are
//! pulled with [`Arq::poll_transmit`] and encrypted by the session before
//! they reach the transport.
//!
//! [`KcpArq`] wraps the `kcp` crate and is the engine sessions use by
//! default.

use std::time::Instant;

use thiserror::Error;

mod engine;

pub use engine::KcpArq;

/// Reliable, ordered message delivery over datagrams.
pub trait Arq {
    /// Queue one message for reliable delivery.
    fn submit(&mut self, message: &[u8]) -> ArqResult<()>;

    /// Process one inbound (already decrypted) datagram.
    fn feed(&mut self, datagram: &[u8]) -> ArqResult<()>;

    /// When the engine next needs [`advance`](Arq::advance) to be called.
    fn poll_due_time(&self, now: Instant) -> Instant;

    /// Run timers: send new data, acknowledgments and retransmissions.
    fn advance(&mut self, now: Instant);

    /// Move the next complete message into `buf`, returning its length.
    fn drain(&mut self, buf: &mut Vec<u8>) -> Option<usize>;

    /// Number of outbound segments not yet acknowledged by the peer.
    fn pending_unacked(&self) -> usize;

    /// Take the next datagram the engine wants on the wire.
    fn poll_transmit(&mut self) -> Option<Vec<u8>>;
}

/// ARQ engine errors.
#[derive(Debug, Error)]
pub enum ArqError {
    /// Inbound datagram was rejected by the engine.
    #[error("malformed segment: {0}")]
    Malformed(#[source] kcp::Error),

    /// Message exceeds the largest size the engine carries.
    #[error("message too large: {size} bytes (max {max})")]
    TooLarge {
        /// Submitted size.
        size: usize,
        /// Maximum accepted size.
        max: usize,
    },

    /// The engine refused to queue a message.
    #[error("engine refused message: {0}")]
    Refused(#[source] kcp::Error),
}

impl ArqError {
    /// Check if the error came from bad inbound data.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ArqError::Malformed(_))
    }
}

/// Result type for ARQ operations.
pub type ArqResult<T> = Result<T, ArqError>;

//! kcpuv - Transport Layer
//!
//! This module holds everything between the session and the wire:
//!
//! - **Chunk framing**: [`ChunkHeader`], [`Command`], payload splitting
//! - **Transport seam**: the [`Transport`] trait a session sends through
//! - **In-memory network**: [`MemoryNetwork`] for tests and simulation
//! - **UDP sockets**: [`UdpTransport`] over tokio (requires `runtime`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Session Layer                │
//! ├─────────────────────────────────────────┤
//! │   chunk framing (nonce + command)       │  ← frame.rs
//! ├─────────────────────────────────────────┤
//! │            ARQ engine                   │
//! ├─────────────────────────────────────────┤
//! │         encryption envelope             │
//! ├─────────────────────────────────────────┤
//! │   datagram transport (UDP / memory)     │  ← Transport
//! └─────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;

mod error;
mod frame;
mod memory;
#[cfg(feature = "runtime")]
mod socket;

pub use error::*;
pub use frame::*;
pub use memory::{MemoryNetwork, MemoryTransport};
#[cfg(feature = "runtime")]
pub use socket::UdpTransport;

/// A datagram endpoint owned by one session.
///
/// Sends go to the single remote address, which is either set explicitly
/// or learned from the first inbound datagram.
pub trait Transport {
    /// Send one datagram to the remote address.
    fn send(&mut self, datagram: &[u8]) -> TransportResult<()>;

    /// Set the remote address.
    fn set_remote(&mut self, addr: SocketAddr);

    /// The remote address, if known.
    fn remote(&self) -> Option<SocketAddr>;

    /// Whether a remote address is known.
    fn has_remote(&self) -> bool {
        self.remote().is_some()
    }

    /// Bind to a local port for receiving (`0` picks one).
    fn bind(&mut self, port: u16) -> TransportResult<()>;

    /// The bound local address, if any.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Receive one pending datagram without blocking.
    ///
    /// Returns `Ok(None)` when nothing is waiting.
    fn poll_recv(&mut self, buf: &mut [u8]) -> TransportResult<Option<(usize, SocketAddr)>>;
}

/// Resolve `host:port` to the first matching socket address.
pub fn resolve(host: &str, port: u16) -> TransportResult<SocketAddr> {
    use std::net::ToSocketAddrs;

    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| TransportError::Resolve(format!("{host}:{port}")))
}

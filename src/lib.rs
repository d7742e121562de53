//! # kcpuv
//!
//! Reliable, ordered, encrypted messaging over UDP.
//!
//! kcpuv is a session layer that sits between an application and a
//! datagram socket:
//!
//! - **Sessions**: a forward-only lifecycle with a graceful FIN / FIN_ACK
//!   close handshake, inactivity timeouts and idle keepalives
//! - **Framing**: every chunk carries an 8-byte nonce and a command tag;
//!   large sends are split into independently framed chunks
//! - **Reassembly**: delivered data is batched per tick in a bounded buffer
//! - **ARQ**: retransmission and ordering live behind the [`arq::Arq`]
//!   trait; [`arq::KcpArq`] adapts the `kcp` crate as the default engine
//! - **Crypto**: XChaCha20-Poly1305 datagram envelopes keyed via HKDF
//!
//! ## Feature Flags
//!
//! - `crypto` (default): datagram encryption ([`crypto`])
//! - `runtime` (default): tokio UDP transport and the [`runtime::EventLoop`]
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use kcpuv::prelude::*;
//!
//! let net = MemoryNetwork::new();
//! let mut ctx = Context::default();
//!
//! let server = ctx.create(net.transport());
//! ctx.session_mut(server).unwrap().listen(9000, |_, data| {
//!     println!("received {} bytes", data.len());
//! }).unwrap();
//!
//! let client = ctx.create(net.transport());
//! let session = ctx.session_mut(client).unwrap();
//! session.initiate("127.0.0.1", 9000).unwrap();
//! session.send(b"hello");
//!
//! let mut now = Instant::now();
//! for _ in 0..10 {
//!     ctx.poll_inbound(now);
//!     ctx.tick(now);
//!     now += Duration::from_millis(10);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod arq;
pub mod session;
pub mod transport;

// Crypto layer (feature-gated)
#[cfg(feature = "crypto")]
#[cfg_attr(docsrs, doc(cfg(feature = "crypto")))]
pub mod crypto;

// Event loop (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{ContextConfig, ContextConfigBuilder, SessionConfig, SessionConfigBuilder};
    pub use crate::core::{SessionError, SessionResult};

    pub use crate::arq::{Arq, KcpArq};
    pub use crate::session::{Context, Session, SessionId, SessionState};
    pub use crate::transport::{MemoryNetwork, MemoryTransport, Transport};

    #[cfg(feature = "runtime")]
    pub use crate::runtime::EventLoop;
    #[cfg(feature = "runtime")]
    pub use crate::transport::UdpTransport;
}

// Re-export commonly used items at crate root
pub use crate::core::{SessionError, SessionResult};
pub use crate::session::{Context, Session, SessionId, SessionState};

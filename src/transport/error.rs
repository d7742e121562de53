//! Transport layer error types.

use std::io;

use thiserror::Error;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// No remote address has been set or learned yet.
    #[error("no remote address")]
    NoRemote,

    /// Socket is not bound to a local port.
    #[error("socket not bound")]
    NotBound,

    /// Host name resolved to no usable address.
    #[error("could not resolve {0}")]
    Resolve(String),

    /// The in-memory network has no endpoint at the destination.
    #[error("unreachable destination")]
    Unreachable,
}

impl TransportError {
    /// Check if this error only costs the datagram, not the session.
    ///
    /// Datagram loss is the transport's normal failure mode; the ARQ
    /// engine retransmits.
    pub fn is_silent_drop(&self) -> bool {
        match self {
            TransportError::Unreachable => true,
            TransportError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::ConnectionRefused
            ),
            _ => false,
        }
    }

    /// Check if this error leaves the transport unable to send at all.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::NotBound | TransportError::Resolve(_) => true,
            TransportError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::AddrInUse
                    | io::ErrorKind::AddrNotAvailable
                    | io::ErrorKind::PermissionDenied
            ),
            _ => false,
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

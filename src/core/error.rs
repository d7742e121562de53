//! Error types for the kcpuv session layer.

use thiserror::Error;

use crate::arq::ArqError;
use crate::session::SessionState;
use crate::transport::{FrameError, TransportError};

/// Errors in the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed.
    #[error("key derivation failed")]
    KeyDerivationFailed,

    /// AEAD encryption failed.
    #[error("AEAD encryption failed")]
    EncryptionFailed,

    /// AEAD decryption failed (invalid tag or corrupted).
    #[error("AEAD decryption failed (invalid tag or corrupted)")]
    DecryptionFailed,

    /// Ciphertext shorter than nonce plus tag.
    #[error("ciphertext too short: {0} bytes")]
    TooShort(usize),
}

/// Top-level session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Chunk framing error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// ARQ engine error.
    #[error("arq error: {0}")]
    Arq(#[from] ArqError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// No live session behind the handle.
    #[error("unknown session")]
    UnknownSession,

    /// Operation not permitted in the session's current state.
    #[error("operation not allowed in state {0:?}")]
    InvalidState(SessionState),
}

impl SessionError {
    /// Check if the error only means "drop this input and carry on".
    ///
    /// Inbound garbage never tears a session down; it is logged and
    /// discarded.
    pub fn is_silent_drop(&self) -> bool {
        match self {
            SessionError::Frame(_) | SessionError::Crypto(_) => true,
            SessionError::Arq(err) => err.is_malformed(),
            SessionError::Transport(err) => err.is_silent_drop(),
            _ => false,
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

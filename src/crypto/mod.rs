//! kcpuv - Crypto Layer
//!
//! Datagram encryption for sessions:
//! - HKDF-SHA256 key derivation from the user key
//! - XChaCha20-Poly1305 AEAD with a random 24-byte nonce per datagram
//!
//! A session without a cipher passes datagrams through unchanged.

mod cipher;

pub use cipher::SessionCipher;

//! XChaCha20-Poly1305 datagram envelope.
//!
//! Every outbound datagram is sealed independently:
//!
//! ```text
//! +-------------------+----------------------------+
//! | Nonce             | Ciphertext || Tag          |
//! | 24 bytes (random) | len(plaintext) + 16 bytes  |
//! +-------------------+----------------------------+
//! ```
//!
//! XChaCha20's 192-bit nonce makes random nonces safe without a counter
//! shared between peers.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::{AEAD_NONCE_SIZE, AEAD_TAG_SIZE, CryptoError, KEY_SALT, SESSION_KEY_SIZE};

/// Info string bound into the derived key.
const KEY_INFO: &[u8] = b"kcpuv session key";

/// Derived session key material.
///
/// Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    fn derive(input: &[u8]) -> Result<Self, CryptoError> {
        let mut salt = [0u8; 8];
        salt[..4].copy_from_slice(&KEY_SALT[0].to_le_bytes());
        salt[4..].copy_from_slice(&KEY_SALT[1].to_le_bytes());

        let hk = Hkdf::<Sha256>::new(Some(&salt), input);
        let mut okm = [0u8; SESSION_KEY_SIZE];
        hk.expand(KEY_INFO, &mut okm)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        let key = Self(okm);
        okm.zeroize();
        Ok(key)
    }
}

/// Per-session datagram cipher.
pub struct SessionCipher {
    key: SessionKey,
    aead: XChaCha20Poly1305,
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCipher").finish_non_exhaustive()
    }
}

impl SessionCipher {
    /// Derive a cipher from user key material.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let key = SessionKey::derive(key)?;
        let aead = XChaCha20Poly1305::new((&key.0).into());
        Ok(Self { key, aead })
    }

    #[cfg(test)]
    fn key_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.key.0
    }

    /// Seal one datagram: `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; AEAD_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let sealed = self
            .aead
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(AEAD_NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Open one datagram produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, datagram: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if datagram.len() < AEAD_NONCE_SIZE + AEAD_TAG_SIZE {
            return Err(CryptoError::TooShort(datagram.len()));
        }

        let (nonce, sealed) = datagram.split_at(AEAD_NONCE_SIZE);
        self.aead
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

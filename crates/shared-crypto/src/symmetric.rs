//! # Message Keys
//!
//! One-time XChaCha20-Poly1305 keys for sealed boxes. Associated data is
//! authenticated alongside the ciphertext, so a box cannot be moved to a
//! different context without failing to open.

use crate::CryptoError;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroize;

/// Length of an XChaCha20 nonce.
pub const NONCE_LEN: usize = 24;

/// Length of a message key.
pub const KEY_LEN: usize = 32;

/// Single-use symmetric key, wiped on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MessageKey([u8; KEY_LEN]);

impl MessageKey {
    /// Wrap key material produced by a KDF.
    pub fn from_derived(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new((&self.0).into())
    }

    /// Encrypt `plaintext` under a random nonce, binding `aad`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::EncryptionFailed` if the cipher rejects the input.
    pub fn encrypt(
        &self,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<([u8; NONCE_LEN], Vec<u8>), CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()
            .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad })
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok((nonce, ciphertext))
    }

    /// Decrypt and authenticate `ciphertext` against `aad`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidNonceLength` if `nonce` is not 24 bytes
    /// and `CryptoError::DecryptionFailed` if authentication fails.
    pub fn decrypt(&self, nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if nonce.len() != NONCE_LEN {
            return Err(CryptoError::InvalidNonceLength {
                expected: NONCE_LEN,
                actual: nonce.len(),
            });
        }
        self.cipher()
            .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}

//! Crypto error types.

use thiserror::Error;

/// Failures from key handling, signing and sealed boxes.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A sealed box could not be produced.
    #[error("sealing failed: {0}")]
    EncryptionFailed(String),

    /// A sealed box did not authenticate under the derived key.
    #[error("sealed box rejected: {0}")]
    DecryptionFailed(String),

    /// Nonce carried in a sealed box has the wrong size.
    #[error("nonce must be {expected} bytes, got {actual}")]
    InvalidNonceLength {
        /// Required size in bytes
        expected: usize,
        /// Size found in the box
        actual: usize,
    },

    /// Signature does not match the signed bytes and key.
    #[error("signature does not verify")]
    SignatureVerificationFailed,

    /// Signature bytes are not a 64-byte compact secp256k1 signature.
    #[error("malformed signature")]
    InvalidSignatureFormat,

    /// Public key bytes or PEM are not a valid secp256k1 point.
    #[error("malformed public key")]
    InvalidPublicKey,

    /// Private key bytes or PEM are not a valid secp256k1 scalar.
    #[error("malformed private key")]
    InvalidPrivateKey,

    /// No key pair could be generated.
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Key could not be written as PEM.
    #[error("key encoding failed: {0}")]
    KeyEncodingFailed(String),
}

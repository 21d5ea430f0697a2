//! # Shared Crypto
//!
//! Cryptographic primitives used by IoT publishers.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 ECDSA, PEM keys | Identity keys and message signing |
//! | `symmetric` | XChaCha20-Poly1305 | One-time message keys with associated data |
//! | `sealed` | ECDH + BLAKE3 KDF + XChaCha20-Poly1305 | Encryption to a public key |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, low-S signatures
//! - **XChaCha20**: 192-bit random nonce, tampering fails decryption
//! - **Sealed boxes**: fresh ephemeral key per message

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod sealed;
pub mod symmetric;

// Re-exports
pub use ecdsa::{KeyPair, PublicKey, Signature, SIGNATURE_LEN};
pub use errors::CryptoError;
pub use sealed::{open, seal, SealedBox};
pub use symmetric::MessageKey;

//! # Sealed Boxes
//!
//! Encryption to a recipient's identity key. Each box uses a fresh
//! ephemeral secp256k1 key; the ECDH shared secret, together with both
//! public keys, is run through the BLAKE3 KDF to get a one-time
//! XChaCha20-Poly1305 key.
//!
//! The ephemeral key is authenticated as associated data. Only the holder
//! of the recipient private key can open a box. The box itself says nothing
//! about who sealed it, so callers sign the plaintext.

use crate::ecdsa::{KeyPair, PublicKey};
use crate::symmetric::MessageKey;
use crate::CryptoError;
use k256::ecdh::{diffie_hellman, EphemeralSecret};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// KDF context string; changing it invalidates every existing box.
const KDF_CONTEXT: &str = "iot-domain 2026-10 sealed box v1";

/// Ciphertext plus what the recipient needs to open it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedBox {
    /// Compressed SEC1 ephemeral public key.
    pub ephemeral_key: Vec<u8>,
    /// XChaCha20 nonce.
    pub nonce: Vec<u8>,
    /// Ciphertext including the Poly1305 tag.
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` so only `recipient` can read it.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if encryption fails.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<SealedBox, CryptoError> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_key = PublicKey::from(ephemeral.public_key()).to_sec1_bytes();
    let shared = ephemeral.diffie_hellman(recipient.inner());

    let key = derive_key(
        shared.raw_secret_bytes().as_slice(),
        &ephemeral_key,
        &recipient.to_sec1_bytes(),
    );
    let (nonce, ciphertext) = key.encrypt(&ephemeral_key, plaintext)?;

    Ok(SealedBox {
        ephemeral_key,
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Decrypt a box sealed to `keypair`'s public key.
///
/// # Errors
///
/// Returns `CryptoError::InvalidPublicKey` for a bad ephemeral key,
/// `CryptoError::InvalidNonceLength` for a bad nonce and
/// `CryptoError::DecryptionFailed` for anything that fails authentication.
pub fn open(keypair: &KeyPair, sealed: &SealedBox) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = PublicKey::from_sec1_bytes(&sealed.ephemeral_key)?;
    let shared = diffie_hellman(
        keypair.secret().to_nonzero_scalar(),
        ephemeral.inner().as_affine(),
    );

    let key = derive_key(
        shared.raw_secret_bytes().as_slice(),
        &sealed.ephemeral_key,
        &keypair.public_key().to_sec1_bytes(),
    );
    key.decrypt(&sealed.nonce, &sealed.ephemeral_key, &sealed.ciphertext)
}

fn derive_key(shared: &[u8], ephemeral_key: &[u8], recipient_key: &[u8]) -> MessageKey {
    let mut material = Zeroizing::new(Vec::with_capacity(
        shared.len() + ephemeral_key.len() + recipient_key.len(),
    ));
    material.extend_from_slice(shared);
    material.extend_from_slice(ephemeral_key);
    material.extend_from_slice(recipient_key);
    MessageKey::from_derived(blake3::derive_key(KDF_CONTEXT, &material))
}

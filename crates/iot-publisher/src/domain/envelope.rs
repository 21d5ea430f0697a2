//! # Secure Envelope
//!
//! Signed, optionally encrypted, wrappers around every published payload.
//!
//! ## Wire Format
//!
//! ```text
//! {"framing":"plain", "address", "sender", "timestamp", "payload", "signature"}
//! {"framing":"sealed", "ephemeral_key", "nonce", "ciphertext"}
//! ```
//!
//! `payload` is the JSON payload and `signature` the 64 byte ECDSA signature
//! over the bincode encoding of (address, sender, timestamp, payload), both
//! base64. A sealed frame carries a complete plain frame encrypted to the
//! recipient, so signing always happens before encryption.
//!
//! ## Receive Pipeline
//!
//! parse → encryption policy → decrypt → address check → sender lookup →
//! signature → payload. Any failure yields a [`DiscardReason`] and nothing
//! else; the message has no effect.

use crate::domain::errors::{DiscardReason, PublisherError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use shared_crypto::{KeyPair, PublicKey, SealedBox, Signature};
use shared_types::timestamp::is_well_formed;
use shared_types::now_timestamp;
use tracing::warn;

/// A frame as it travels on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "framing", rename_all = "lowercase")]
pub enum Frame {
    Plain(SignedFrame),
    Sealed(SealedFrame),
}

/// Signed message, readable by anyone.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedFrame {
    pub address: String,
    pub sender: String,
    pub timestamp: String,
    #[serde_as(as = "Base64")]
    pub payload: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub signature: Vec<u8>,
}

/// A [`SignedFrame`] encrypted to one recipient.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedFrame {
    #[serde_as(as = "Base64")]
    pub ephemeral_key: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub nonce: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub ciphertext: Vec<u8>,
}

#[derive(Serialize)]
struct SignedContent<'a> {
    address: &'a str,
    sender: &'a str,
    timestamp: &'a str,
    payload: &'a [u8],
}

fn signed_bytes(
    address: &str,
    sender: &str,
    timestamp: &str,
    payload: &[u8],
) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(&SignedContent {
        address,
        sender,
        timestamp,
        payload,
    })
}

/// A message that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedMessage<T> {
    pub address: String,
    pub sender: String,
    pub timestamp: String,
    /// True if the message arrived sealed.
    pub encrypted: bool,
    pub payload: T,
}

/// A frame that was parsed, decrypted if needed, and matched against its
/// topic, but whose signature is not checked yet.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    frame: SignedFrame,
    encrypted: bool,
}

impl DecodedFrame {
    /// Claimed sender. Not authenticated until [`Self::verify`] succeeds.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.frame.sender
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.frame.address
    }

    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Check the signature against `key`.
    pub fn verify(&self, key: &PublicKey) -> Result<(), DiscardReason> {
        let signature = Signature::from_slice(&self.frame.signature)
            .map_err(|_| DiscardReason::MalformedEnvelope("signature must be 64 bytes".into()))?;
        let content = signed_bytes(
            &self.frame.address,
            &self.frame.sender,
            &self.frame.timestamp,
            &self.frame.payload,
        )
        .map_err(|e| DiscardReason::MalformedEnvelope(e.to_string()))?;

        key.verify(&content, &signature)
            .map_err(|_| DiscardReason::BadSignature(self.frame.sender.clone()))
    }

    /// Parse the payload without authenticating it.
    ///
    /// Only for picking the verification key, e.g. the key a first-contact
    /// identity document presents.
    pub fn peek<T: DeserializeOwned>(&self) -> Result<T, DiscardReason> {
        serde_json::from_slice(&self.frame.payload)
            .map_err(|e| DiscardReason::PayloadMismatch(e.to_string()))
    }

    /// Verify under `key` and parse the payload.
    pub fn verify_with<T: DeserializeOwned>(
        self,
        key: &PublicKey,
    ) -> Result<VerifiedMessage<T>, DiscardReason> {
        self.verify(key)?;
        let payload = self.peek()?;
        Ok(VerifiedMessage {
            address: self.frame.address,
            sender: self.frame.sender,
            timestamp: self.frame.timestamp,
            encrypted: self.encrypted,
            payload,
        })
    }
}

/// Builds and checks envelopes on behalf of one publisher.
pub struct SecureEnvelope<'a> {
    sender: &'a str,
    keys: &'a KeyPair,
}

impl<'a> SecureEnvelope<'a> {
    /// Envelope for messages sent as `sender` and signed with `keys`.
    /// `keys` also opens frames sealed to this publisher.
    #[must_use]
    pub fn new(sender: &'a str, keys: &'a KeyPair) -> Self {
        Self { sender, keys }
    }

    /// Serialize, sign and, with a `recipient`, encrypt a payload.
    pub fn publish<T: Serialize>(
        &self,
        address: &str,
        payload: &T,
        recipient: Option<&PublicKey>,
    ) -> Result<Vec<u8>, PublisherError> {
        let encode_error = |reason: String| PublisherError::Encode {
            address: address.to_string(),
            reason,
        };

        let payload = serde_json::to_vec(payload).map_err(|e| encode_error(e.to_string()))?;
        let timestamp = now_timestamp();
        let content = signed_bytes(address, self.sender, &timestamp, &payload)
            .map_err(|e| encode_error(e.to_string()))?;
        let signature = self.keys.sign(&content);

        let mut frame = Frame::Plain(SignedFrame {
            address: address.to_string(),
            sender: self.sender.to_string(),
            timestamp,
            payload,
            signature: signature.as_bytes().to_vec(),
        });

        if let Some(recipient) = recipient {
            let plain = serde_json::to_vec(&frame).map_err(|e| encode_error(e.to_string()))?;
            let sealed =
                shared_crypto::seal(recipient, &plain).map_err(|e| encode_error(e.to_string()))?;
            frame = Frame::Sealed(SealedFrame {
                ephemeral_key: sealed.ephemeral_key,
                nonce: sealed.nonce,
                ciphertext: sealed.ciphertext,
            });
        }

        serde_json::to_vec(&frame).map_err(|e| encode_error(e.to_string()))
    }

    /// Parse and decrypt `raw`, enforce the encryption policy and check that
    /// the frame was addressed to the `topic` it arrived on.
    pub fn decode(
        &self,
        topic: &str,
        raw: &[u8],
        require_encrypted: bool,
    ) -> Result<DecodedFrame, DiscardReason> {
        let frame: Frame = serde_json::from_slice(raw)
            .map_err(|e| DiscardReason::MalformedEnvelope(e.to_string()))?;

        let (signed, encrypted) = match frame {
            Frame::Plain(_) if require_encrypted => return Err(DiscardReason::NotEncrypted),
            Frame::Plain(signed) => (signed, false),
            Frame::Sealed(sealed) => {
                let plain = shared_crypto::open(
                    self.keys,
                    &SealedBox {
                        ephemeral_key: sealed.ephemeral_key,
                        nonce: sealed.nonce,
                        ciphertext: sealed.ciphertext,
                    },
                )
                .map_err(|_| DiscardReason::DecryptionFailed)?;
                match serde_json::from_slice(&plain) {
                    Ok(Frame::Plain(signed)) => (signed, true),
                    Ok(Frame::Sealed(_)) => {
                        return Err(DiscardReason::MalformedEnvelope("nested sealed frame".into()))
                    }
                    Err(e) => return Err(DiscardReason::MalformedEnvelope(e.to_string())),
                }
            }
        };

        if signed.address != topic {
            return Err(DiscardReason::AddressMismatch {
                envelope: signed.address,
                topic: topic.to_string(),
            });
        }
        if !is_well_formed(&signed.timestamp) {
            return Err(DiscardReason::MalformedEnvelope(format!(
                "bad timestamp {:?}",
                signed.timestamp
            )));
        }
        Ok(DecodedFrame {
            frame: signed,
            encrypted,
        })
    }

    /// Full receive pipeline. `lookup` resolves the claimed sender's key.
    pub fn open<T, F>(
        &self,
        topic: &str,
        raw: &[u8],
        require_encrypted: bool,
        lookup: F,
    ) -> Result<VerifiedMessage<T>, DiscardReason>
    where
        T: DeserializeOwned,
        F: FnOnce(&str) -> Option<PublicKey>,
    {
        let decoded = self.decode(topic, raw, require_encrypted)?;
        let key = lookup(decoded.sender())
            .ok_or_else(|| DiscardReason::UnknownSender(decoded.sender().to_string()))?;
        decoded.verify_with(&key)
    }

    /// Like [`Self::open`], but logs the discard instead of returning it.
    pub fn receive<T, F>(
        &self,
        topic: &str,
        raw: &[u8],
        require_encrypted: bool,
        lookup: F,
    ) -> Option<VerifiedMessage<T>>
    where
        T: DeserializeOwned,
        F: FnOnce(&str) -> Option<PublicKey>,
    {
        match self.open(topic, raw, require_encrypted, lookup) {
            Ok(message) => Some(message),
            Err(reason) => {
                warn!(topic = topic, reason = %reason, "Message discarded");
                None
            }
        }
    }
}

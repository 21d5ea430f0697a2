//! Error types for the publisher.

use crate::config::ConfigError;
use crate::ports::outbound::StoreError;
use shared_bus::TransportError;
use shared_types::AddressError;
use thiserror::Error;

/// Identity lifecycle failures.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Stored identity is inconsistent with what is expected.
    #[error("Corrupt identity for {publisher_id}: {reason}")]
    CorruptIdentity { publisher_id: String, reason: String },

    /// No key material could be produced. Fatal for the publisher.
    #[error("Key generation failed: {0}")]
    KeyGenerationFailure(String),

    /// Nothing stored for this publisher.
    #[error("No stored identity for {0}")]
    NotFound(String),

    /// The identity store failed.
    #[error("Identity store error: {0}")]
    Store(#[source] StoreError),

    /// An issuer update failed one of its checks.
    #[error("Identity update rejected: {0}")]
    RejectedUpdate(String),
}

impl From<StoreError> for IdentityError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(path) => IdentityError::NotFound(path),
            other => IdentityError::Store(other),
        }
    }
}

/// Why an inbound message was dropped.
///
/// Never returned to API callers; inbound handlers log it and move on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscardReason {
    #[error("message must be encrypted")]
    NotEncrypted,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("unknown sender {0}")]
    UnknownSender(String),

    #[error("signature of {0} does not verify")]
    BadSignature(String),

    #[error("envelope address {envelope} differs from topic {topic}")]
    AddressMismatch { envelope: String, topic: String },

    #[error("unexpected payload: {0}")]
    PayloadMismatch(String),
}

/// Errors returned by the publisher API.
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The recipient's public key is not in the peer directory.
    #[error("Unknown recipient publisher {0}")]
    UnknownRecipient(String),

    /// The node, input or output is not registered.
    #[error("Unknown node, input or output {0}")]
    UnknownNode(String),

    /// An outbound message could not be built.
    #[error("Failed to encode message for {address}: {reason}")]
    Encode { address: String, reason: String },

    /// The heartbeat loop never acknowledged its start.
    #[error("Heartbeat loop failed to start")]
    LoopStartFailed,
}

//! # Peer Directory
//!
//! Known publishers and their public keys, learned from identity
//! broadcasts.
//!
//! One record per publisher; the last verified write wins and records are
//! never evicted. Staleness is for the reader to judge from `valid_until`.
//!
//! The lock is held only across map access. Signature checks run on keys
//! copied out of the map.

use crate::domain::envelope::DecodedFrame;
use crate::domain::errors::DiscardReason;
use crate::domain::identity::verify_document;
use parking_lot::Mutex;
use shared_crypto::{PublicKey, Signature};
use shared_types::{identity_address, now_timestamp, PublicIdentity, ISSUER_PUBLISHER_ID};
use std::collections::HashMap;
use tracing::debug;

/// What is known about one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub publisher_id: String,
    pub identity: PublicIdentity,
    pub public_key: PublicKey,
    /// When the record was last written.
    pub last_seen: String,
}

/// Thread-safe registry of publisher id to identity.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: Mutex<HashMap<String, PeerRecord>>,
}

impl PeerDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `identity` under its publisher id, replacing any previous
    /// record. The caller must have authenticated it.
    pub fn upsert(&self, identity: PublicIdentity, public_key: PublicKey) {
        let record = PeerRecord {
            publisher_id: identity.publisher_id.clone(),
            identity,
            public_key,
            last_seen: now_timestamp(),
        };
        self.peers.lock().insert(record.publisher_id.clone(), record);
    }

    #[must_use]
    pub fn get_public_key(&self, publisher_id: &str) -> Option<PublicKey> {
        self.peers
            .lock()
            .get(publisher_id)
            .map(|record| record.public_key.clone())
    }

    #[must_use]
    pub fn get(&self, publisher_id: &str) -> Option<PeerRecord> {
        self.peers.lock().get(publisher_id).cloned()
    }

    #[must_use]
    pub fn contains(&self, publisher_id: &str) -> bool {
        self.peers.lock().contains_key(publisher_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// Sorted ids of every known publisher.
    #[must_use]
    pub fn publisher_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.peers.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Verify `signature` over `message` with the key on record for
    /// `publisher_id`. An unknown publisher never verifies.
    #[must_use]
    pub fn verify(&self, publisher_id: &str, message: &[u8], signature: &Signature) -> bool {
        self.get_public_key(publisher_id)
            .is_some_and(|key| key.verify(message, signature).is_ok())
    }

    /// Authenticate an identity broadcast and record it.
    ///
    /// The document must name the sender, belong to `domain`, use the
    /// deterministic identity address and carry a valid signature from its
    /// issuer (itself, or the issuer on record). The envelope must then
    /// verify under:
    ///
    /// - the key on record, when the document presents that same key
    /// - the presented key on first contact
    /// - the presented key when an issued document rotates a recorded key
    ///
    /// Anything else leaves the directory unchanged.
    pub fn admit(&self, domain: &str, frame: &DecodedFrame) -> Result<PublicIdentity, DiscardReason> {
        let document: PublicIdentity = frame.peek()?;
        let sender = frame.sender();
        let mismatch = |reason: String| -> Result<PublicIdentity, DiscardReason> {
            Err(DiscardReason::PayloadMismatch(reason))
        };

        if document.publisher_id != sender {
            return mismatch(format!(
                "document of {} sent by {sender}",
                document.publisher_id
            ));
        }
        if document.domain != domain {
            return mismatch(format!("document for domain {}", document.domain));
        }
        if document.address != identity_address(domain, sender) {
            return mismatch(format!("identity address {}", document.address));
        }

        let presented = PublicKey::from_pem(&document.public_key)
            .map_err(|_| DiscardReason::PayloadMismatch("unreadable public key".into()))?;
        let recorded = self.get_public_key(sender);

        let issued = if document.is_self_signed() {
            verify_document(&document, &presented)
                .map_err(|_| DiscardReason::BadSignature(sender.to_string()))?;
            false
        } else if document.issuer_name == ISSUER_PUBLISHER_ID {
            let issuer_key = self
                .get_public_key(ISSUER_PUBLISHER_ID)
                .ok_or_else(|| DiscardReason::UnknownSender(ISSUER_PUBLISHER_ID.to_string()))?;
            verify_document(&document, &issuer_key)
                .map_err(|_| DiscardReason::BadSignature(ISSUER_PUBLISHER_ID.to_string()))?;
            true
        } else {
            return mismatch(format!("unknown issuer {}", document.issuer_name));
        };

        match recorded {
            Some(recorded) if recorded == presented => frame.verify(&recorded)?,
            Some(_) if !issued => return Err(DiscardReason::BadSignature(sender.to_string())),
            _ => frame.verify(&presented)?,
        }

        debug!(publisher = %sender, issued = issued, "Peer identity recorded");
        self.upsert(document.clone(), presented);
        Ok(document)
    }
}

//! # Identity Manager
//!
//! Key generation, identity documents, persistence and issuer updates.
//!
//! ## States
//!
//! ```text
//! Uninitialized ──generate/load──→ SelfSigned ──issuer update──→ Issued
//!                                       │                          │
//!                                       └────────→ Expired ←───────┘
//! ```
//!
//! `Expired` is advisory. An expired identity keeps being used until the
//! issuer replaces it; nothing regenerates it automatically.
//!
//! ## Expiry
//!
//! Timestamps are fixed width and zero padded, so expiry is a plain string
//! comparison of the current time against `valid_until`.

use crate::domain::envelope::VerifiedMessage;
use crate::domain::errors::IdentityError;
use crate::ports::outbound::IdentityStore;
use shared_crypto::{CryptoError, KeyPair, PublicKey, Signature};
use shared_types::{
    identity_address, now_timestamp, timestamp_after, FullIdentity, PublicIdentity,
    ISSUER_PUBLISHER_ID,
};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Default lifetime of a generated identity.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(365 * 24 * 3600);

/// Where an identity stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStatus {
    SelfSigned,
    Issued,
    Expired,
}

impl fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdentityStatus::SelfSigned => "self-signed",
            IdentityStatus::Issued => "issued",
            IdentityStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// True once the current time is past `valid_until`.
#[must_use]
pub fn is_expired(document: &PublicIdentity) -> bool {
    is_expired_at(document, &now_timestamp())
}

/// True if `now` is lexically past `valid_until`.
#[must_use]
pub fn is_expired_at(document: &PublicIdentity, now: &str) -> bool {
    now > document.valid_until.as_str()
}

fn document_bytes(document: &PublicIdentity) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(&document.signing_fields())
}

/// Sign `document` in place with `signer`.
pub fn sign_document(document: &mut PublicIdentity, signer: &KeyPair) -> Result<(), IdentityError> {
    let bytes = document_bytes(document).map_err(|e| IdentityError::CorruptIdentity {
        publisher_id: document.publisher_id.clone(),
        reason: e.to_string(),
    })?;
    document.signature = signer.sign(&bytes).as_bytes().to_vec();
    Ok(())
}

/// Check the document signature against `key`.
pub fn verify_document(document: &PublicIdentity, key: &PublicKey) -> Result<(), CryptoError> {
    let signature = Signature::from_slice(&document.signature)?;
    let bytes = document_bytes(document).map_err(|_| CryptoError::InvalidSignatureFormat)?;
    key.verify(&bytes, &signature)
}

/// This publisher's identity: its public document and signing keys.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    document: PublicIdentity,
    keys: KeyPair,
}

impl LocalIdentity {
    #[must_use]
    pub fn document(&self) -> &PublicIdentity {
        &self.document
    }

    #[must_use]
    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    #[must_use]
    pub fn publisher_id(&self) -> &str {
        &self.document.publisher_id
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    /// Status derived from the document.
    #[must_use]
    pub fn status(&self) -> IdentityStatus {
        if is_expired(&self.document) {
            IdentityStatus::Expired
        } else if self.document.is_self_signed() {
            IdentityStatus::SelfSigned
        } else {
            IdentityStatus::Issued
        }
    }

    /// The stored form, with the private key as PEM.
    pub fn to_full(&self) -> Result<FullIdentity, IdentityError> {
        let private_key = self.keys.to_pem().map_err(|e| IdentityError::CorruptIdentity {
            publisher_id: self.document.publisher_id.clone(),
            reason: e.to_string(),
        })?;
        Ok(FullIdentity {
            identity: self.document.clone(),
            private_key: private_key.to_string(),
        })
    }
}

/// Creates, loads and replaces the identity of one publisher.
#[derive(Debug, Clone)]
pub struct IdentityManager {
    domain: String,
    publisher_id: String,
    organization: String,
    location: String,
    validity: Duration,
}

impl IdentityManager {
    #[must_use]
    pub fn new(domain: &str, publisher_id: &str) -> Self {
        Self {
            domain: domain.to_string(),
            publisher_id: publisher_id.to_string(),
            organization: String::new(),
            location: String::new(),
            validity: DEFAULT_VALIDITY,
        }
    }

    /// Organization and location recorded in generated documents.
    #[must_use]
    pub fn with_profile(mut self, organization: &str, location: &str) -> Self {
        self.organization = organization.to_string();
        self.location = location.to_string();
        self
    }

    #[must_use]
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    #[must_use]
    pub fn publisher_id(&self) -> &str {
        &self.publisher_id
    }

    /// Generate a fresh key pair and self-signed document.
    ///
    /// # Errors
    ///
    /// `KeyGenerationFailure` if no key could be produced. The publisher
    /// cannot run without one.
    pub fn generate(&self) -> Result<LocalIdentity, IdentityError> {
        let keys =
            KeyPair::generate().map_err(|e| IdentityError::KeyGenerationFailure(e.to_string()))?;
        let mut document = self.unsigned_document(&keys.public_key(), &self.publisher_id)?;
        sign_document(&mut document, &keys)?;
        info!(
            publisher = %self.publisher_id,
            valid_until = %document.valid_until,
            "Generated self-signed identity"
        );
        Ok(LocalIdentity { document, keys })
    }

    /// Issue an identity for this manager's publisher, signed by `issuer`.
    ///
    /// This is the issuer side of an identity update.
    pub fn issue(&self, issuer: &LocalIdentity) -> Result<FullIdentity, IdentityError> {
        let keys =
            KeyPair::generate().map_err(|e| IdentityError::KeyGenerationFailure(e.to_string()))?;
        let mut document = self.unsigned_document(&keys.public_key(), issuer.publisher_id())?;
        sign_document(&mut document, issuer.keys())?;
        LocalIdentity { document, keys }.to_full()
    }

    fn unsigned_document(
        &self,
        public_key: &PublicKey,
        issuer_name: &str,
    ) -> Result<PublicIdentity, IdentityError> {
        let public_key = public_key
            .to_pem()
            .map_err(|e| IdentityError::KeyGenerationFailure(e.to_string()))?;
        Ok(PublicIdentity {
            address: identity_address(&self.domain, &self.publisher_id),
            domain: self.domain.clone(),
            publisher_id: self.publisher_id.clone(),
            issuer_name: issuer_name.to_string(),
            organization: self.organization.clone(),
            location: self.location.clone(),
            public_key,
            timestamp: now_timestamp(),
            valid_until: timestamp_after(self.validity),
            signature: Vec::new(),
        })
    }

    /// Write `identity` to `store`, replacing what was there.
    pub fn persist(
        &self,
        store: &dyn IdentityStore,
        identity: &LocalIdentity,
    ) -> Result<(), IdentityError> {
        store.save_identity(&identity.to_full()?)?;
        Ok(())
    }

    /// Read the identity from `store` and check it belongs to this publisher.
    pub fn load(&self, store: &dyn IdentityStore) -> Result<LocalIdentity, IdentityError> {
        let full = store.load_identity(&self.publisher_id)?;
        self.from_full(&full)
    }

    /// Validate a stored or issued identity against this publisher.
    pub fn from_full(&self, full: &FullIdentity) -> Result<LocalIdentity, IdentityError> {
        let corrupt = |reason: &str| IdentityError::CorruptIdentity {
            publisher_id: self.publisher_id.clone(),
            reason: reason.to_string(),
        };
        let document = &full.identity;

        if document.domain != self.domain {
            return Err(corrupt("domain does not match"));
        }
        if document.publisher_id != self.publisher_id {
            return Err(corrupt("publisher id does not match"));
        }
        if document.address != identity_address(&self.domain, &self.publisher_id) {
            return Err(corrupt("address is not the identity address"));
        }
        if document.public_key.trim().is_empty() {
            return Err(corrupt("public key is missing"));
        }
        let public_key =
            PublicKey::from_pem(&document.public_key).map_err(|_| corrupt("public key unreadable"))?;
        let keys =
            KeyPair::from_pem(&full.private_key).map_err(|_| corrupt("private key unreadable"))?;
        if keys.public_key() != public_key {
            return Err(corrupt("private key does not match public key"));
        }

        Ok(LocalIdentity {
            document: document.clone(),
            keys,
        })
    }

    /// Load the stored identity, or generate and persist a new one.
    ///
    /// A stored identity that fails to load or fails its consistency checks
    /// is replaced. An expired one is kept and only logged; the issuer is
    /// expected to replace it. Without a store the identity lives in memory.
    pub fn setup(&self, store: Option<&dyn IdentityStore>) -> Result<LocalIdentity, IdentityError> {
        let Some(store) = store else {
            info!(publisher = %self.publisher_id, "No identity store, identity is not persisted");
            return self.generate();
        };

        match self.load(store) {
            Ok(identity) => {
                if is_expired(identity.document()) {
                    warn!(
                        publisher = %self.publisher_id,
                        valid_until = %identity.document().valid_until,
                        "Identity expired, waiting for issuer replacement"
                    );
                } else {
                    info!(
                        publisher = %self.publisher_id,
                        status = %identity.status(),
                        "Loaded identity"
                    );
                }
                Ok(identity)
            }
            Err(IdentityError::NotFound(_)) => {
                info!(publisher = %self.publisher_id, "No stored identity, generating one");
                self.regenerate(store)
            }
            Err(error) => {
                warn!(
                    publisher = %self.publisher_id,
                    error = %error,
                    "Stored identity unusable, regenerating"
                );
                self.regenerate(store)
            }
        }
    }

    fn regenerate(&self, store: &dyn IdentityStore) -> Result<LocalIdentity, IdentityError> {
        let identity = self.generate()?;
        self.persist(store, &identity)?;
        Ok(identity)
    }

    /// Check an identity update sent by the issuer.
    ///
    /// The update must have arrived encrypted, come from the issuer, target
    /// this publisher and carry a document signed by `issuer_key` whose
    /// public key matches the delivered private key. On success the new
    /// identity is returned; the caller swaps it in.
    pub fn apply_issued_update(
        &self,
        message: &VerifiedMessage<FullIdentity>,
        issuer_key: Option<&PublicKey>,
    ) -> Result<LocalIdentity, IdentityError> {
        let reject = |reason: String| IdentityError::RejectedUpdate(reason);

        if !message.encrypted {
            return Err(reject("update was not encrypted".into()));
        }
        if message.sender != ISSUER_PUBLISHER_ID {
            return Err(reject(format!("sender {} is not the issuer", message.sender)));
        }
        let issuer_key = issuer_key.ok_or_else(|| reject("issuer key is not on record".into()))?;

        let document = &message.payload.identity;
        if document.issuer_name != ISSUER_PUBLISHER_ID {
            return Err(reject(format!(
                "document names issuer {}",
                document.issuer_name
            )));
        }
        let candidate = self
            .from_full(&message.payload)
            .map_err(|e| reject(e.to_string()))?;
        verify_document(document, issuer_key)
            .map_err(|_| reject("document is not signed by the issuer".into()))?;

        info!(
            publisher = %self.publisher_id,
            valid_until = %document.valid_until,
            "Accepted issued identity"
        );
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::StoreError;
    use parking_lot::Mutex;
    use shared_types::timestamp_before;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        files: Mutex<HashMap<String, FullIdentity>>,
    }

    impl IdentityStore for MemoryStore {
        fn load_identity(&self, publisher_id: &str) -> Result<FullIdentity, StoreError> {
            self.files
                .lock()
                .get(publisher_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(publisher_id.to_string()))
        }

        fn save_identity(&self, identity: &FullIdentity) -> Result<(), StoreError> {
            self.files
                .lock()
                .insert(identity.identity.publisher_id.clone(), identity.clone());
            Ok(())
        }
    }

    fn manager() -> IdentityManager {
        IdentityManager::new("test", "pub1").with_profile("acme", "kitchen")
    }

    fn update_from(issuer: &LocalIdentity, full: FullIdentity) -> VerifiedMessage<FullIdentity> {
        VerifiedMessage {
            address: "test/pub1/$updateidentity".to_string(),
            sender: issuer.publisher_id().to_string(),
            timestamp: now_timestamp(),
            encrypted: true,
            payload: full,
        }
    }

    #[test]
    fn test_generate_self_signed() {
        let identity = manager().generate().unwrap();
        let document = identity.document();

        assert_eq!(document.address, "test/pub1/$identity");
        assert_eq!(document.issuer_name, "pub1");
        assert_eq!(document.location, "kitchen");
        assert_eq!(identity.status(), IdentityStatus::SelfSigned);
        assert!(verify_document(document, &identity.public_key()).is_ok());

        let other = manager().generate().unwrap();
        assert!(verify_document(document, &other.public_key()).is_err());
    }

    #[test]
    fn test_expiry_is_lexical() {
        let mut identity = manager().generate().unwrap();
        assert!(!is_expired(identity.document()));

        identity.document.valid_until = timestamp_before(Duration::from_secs(1));
        assert!(is_expired(identity.document()));
        assert_eq!(identity.status(), IdentityStatus::Expired);

        identity.document.valid_until = timestamp_after(Duration::from_secs(365 * 24 * 3600));
        assert!(!is_expired(identity.document()));

        let document = identity.document();
        assert!(!is_expired_at(document, &document.valid_until));
    }

    #[test]
    fn test_setup_reloads_same_identity() {
        let store = MemoryStore::default();
        let first = manager().setup(Some(&store)).unwrap();
        let second = manager().setup(Some(&store)).unwrap();

        assert_eq!(first.document(), second.document());
        assert_eq!(first.public_key(), second.public_key());
    }

    #[test]
    fn test_setup_regenerates_corrupt_identity() {
        let store = MemoryStore::default();
        let original = manager().setup(Some(&store)).unwrap();

        let mut tampered = original.to_full().unwrap();
        tampered.identity.domain = "elsewhere".to_string();
        store.save_identity(&tampered).unwrap();

        let replaced = manager().setup(Some(&store)).unwrap();
        assert_ne!(replaced.public_key(), original.public_key());
        assert_eq!(replaced.document().domain, "test");
        // the regenerated identity was written back
        let stored = store.load_identity("pub1").unwrap();
        assert_eq!(&stored.identity, replaced.document());
    }

    #[test]
    fn test_setup_keeps_expired_identity() {
        let store = MemoryStore::default();
        let mut identity = manager().generate().unwrap();
        identity.document.valid_until = timestamp_before(Duration::from_secs(1));
        sign_document(&mut identity.document, &identity.keys).unwrap();
        manager().persist(&store, &identity).unwrap();

        let loaded = manager().setup(Some(&store)).unwrap();
        assert_eq!(loaded.status(), IdentityStatus::Expired);
        assert_eq!(loaded.public_key(), identity.public_key());
    }

    #[test]
    fn test_from_full_detects_mismatched_keys() {
        let a = manager().generate().unwrap();
        let b = manager().generate().unwrap();
        let mut full = a.to_full().unwrap();
        full.private_key = b.to_full().unwrap().private_key;

        assert!(matches!(
            manager().from_full(&full),
            Err(IdentityError::CorruptIdentity { .. })
        ));

        let mut full = a.to_full().unwrap();
        full.identity.public_key = String::new();
        assert!(matches!(
            manager().from_full(&full),
            Err(IdentityError::CorruptIdentity { .. })
        ));
    }

    #[test]
    fn test_issued_update_accepted() {
        let issuer = IdentityManager::new("test", ISSUER_PUBLISHER_ID).generate().unwrap();
        let issued = manager().issue(&issuer).unwrap();

        let accepted = manager()
            .apply_issued_update(&update_from(&issuer, issued.clone()), Some(&issuer.public_key()))
            .unwrap();

        assert_eq!(accepted.status(), IdentityStatus::Issued);
        assert_eq!(accepted.document(), &issued.identity);
    }

    #[test]
    fn test_issued_update_rejections() {
        let issuer = IdentityManager::new("test", ISSUER_PUBLISHER_ID).generate().unwrap();
        let issued = manager().issue(&issuer).unwrap();
        let issuer_key = issuer.public_key();

        let mut plaintext = update_from(&issuer, issued.clone());
        plaintext.encrypted = false;
        assert!(matches!(
            manager().apply_issued_update(&plaintext, Some(&issuer_key)),
            Err(IdentityError::RejectedUpdate(_))
        ));

        let mut wrong_sender = update_from(&issuer, issued.clone());
        wrong_sender.sender = "pub2".to_string();
        assert!(manager()
            .apply_issued_update(&wrong_sender, Some(&issuer_key))
            .is_err());

        assert!(manager()
            .apply_issued_update(&update_from(&issuer, issued.clone()), None)
            .is_err());

        let impostor = IdentityManager::new("test", ISSUER_PUBLISHER_ID).generate().unwrap();
        assert!(manager()
            .apply_issued_update(&update_from(&issuer, issued.clone()), Some(&impostor.public_key()))
            .is_err());

        let for_other = IdentityManager::new("test", "pub2").issue(&issuer).unwrap();
        assert!(manager()
            .apply_issued_update(&update_from(&issuer, for_other), Some(&issuer_key))
            .is_err());
    }
}

//! # Identity Documents
//!
//! The public identity a publisher announces, and the full identity (public
//! document plus PEM private key) kept in the local identity file or
//! delivered by the issuer.
//!
//! ## Invariants
//!
//! - `address` is always `identity_address(domain, publisher_id)`.
//! - The document is valid while the current timestamp is lexically `<=`
//!   `valid_until`.
//! - `signature` covers [`IdentitySigningFields`], i.e. every field but itself.

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::fmt;

/// Publisher id of the trusted issuing authority.
pub const ISSUER_PUBLISHER_ID: &str = "dss";

/// Public identity document of a publisher.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIdentity {
    pub address: String,
    pub domain: String,
    pub publisher_id: String,
    /// Publisher id of the signer; equals `publisher_id` when self-signed.
    pub issuer_name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub location: String,
    /// SPKI PEM encoded public key.
    pub public_key: String,
    pub timestamp: String,
    pub valid_until: String,
    #[serde_as(as = "Base64")]
    pub signature: Vec<u8>,
}

impl PublicIdentity {
    /// The fields covered by the document signature.
    #[must_use]
    pub fn signing_fields(&self) -> IdentitySigningFields<'_> {
        IdentitySigningFields {
            address: &self.address,
            domain: &self.domain,
            publisher_id: &self.publisher_id,
            issuer_name: &self.issuer_name,
            organization: &self.organization,
            location: &self.location,
            public_key: &self.public_key,
            timestamp: &self.timestamp,
            valid_until: &self.valid_until,
        }
    }

    /// True if the publisher signed its own document.
    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        self.issuer_name == self.publisher_id
    }
}

/// Borrowed view of the signed part of a [`PublicIdentity`].
#[derive(Debug, Serialize)]
pub struct IdentitySigningFields<'a> {
    pub address: &'a str,
    pub domain: &'a str,
    pub publisher_id: &'a str,
    pub issuer_name: &'a str,
    pub organization: &'a str,
    pub location: &'a str,
    pub public_key: &'a str,
    pub timestamp: &'a str,
    pub valid_until: &'a str,
}

/// Public document plus private key.
///
/// Stored in `<folder>/<publisherID>-identity.json` and carried, encrypted,
/// in issuer identity updates.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullIdentity {
    pub identity: PublicIdentity,
    /// PKCS#8 PEM encoded private key.
    pub private_key: String,
}

impl fmt::Debug for FullIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullIdentity")
            .field("identity", &self.identity)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

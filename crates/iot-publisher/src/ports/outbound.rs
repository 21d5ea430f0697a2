//! # Driven Ports (Outbound SPI)
//!
//! Storage the runtime needs from the host. The transport port lives in
//! `shared-bus`.

use shared_types::{FullIdentity, Node};
use thiserror::Error;

/// Persistent storage for the local identity file.
///
/// The stored form holds the private key, so implementations should keep
/// it readable by the owner only.
pub trait IdentityStore: Send + Sync {
    /// Load the identity of `publisher_id`.
    ///
    /// Returns `StoreError::NotFound` if nothing was stored yet.
    fn load_identity(&self, publisher_id: &str) -> Result<FullIdentity, StoreError>;

    /// Replace the stored identity of `identity.identity.publisher_id`.
    fn save_identity(&self, identity: &FullIdentity) -> Result<(), StoreError>;
}

/// Persistent storage for node snapshots, including configured values.
pub trait NodeStore: Send + Sync {
    /// Load the nodes of `publisher_id`.
    fn load_nodes(&self, publisher_id: &str) -> Result<Vec<Node>, StoreError>;

    /// Replace the stored nodes of `publisher_id`.
    fn save_nodes(&self, publisher_id: &str, nodes: &[Node]) -> Result<(), StoreError>;
}

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing stored under this key
    #[error("Nothing stored at {0}")]
    NotFound(String),

    /// Filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or folder involved
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Stored content could not be encoded or decoded
    #[error("Serialization error on {path}: {reason}")]
    Serialization {
        /// File involved
        path: String,
        /// Encoder message
        reason: String,
    },
}

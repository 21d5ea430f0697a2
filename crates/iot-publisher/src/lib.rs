//! # IoT Publisher
//!
//! Lets a publisher announce its nodes, inputs and outputs on a shared,
//! untrusted bus and accept control messages only from authenticated
//! senders.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): identity lifecycle, secure envelopes,
//!   peer directory and node registry, no I/O
//! - **Ports Layer** (`ports/`): application hooks and storage interfaces
//! - **Adapters Layer** (`adapters/`): file backed stores
//! - **Service Layer** (`service/`): the heartbeat runtime wiring it together
//!
//! ## Security Notes
//!
//! - Every inbound control message is verified before it has any effect;
//!   failures are logged and dropped, never surfaced to callers
//! - Commands are encrypted to the recipient, identity updates must be
//! - Peer keys are learned on first contact, the issuer key included

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::file_store::{FileIdentityStore, FileNodeStore};
pub use config::{ConfigError, PublisherConfig};
pub use domain::envelope::{DecodedFrame, Frame, SecureEnvelope, VerifiedMessage};
pub use domain::errors::{DiscardReason, IdentityError, PublisherError};
pub use domain::identity::{is_expired, is_expired_at, IdentityManager, IdentityStatus, LocalIdentity};
pub use domain::peers::{PeerDirectory, PeerRecord};
pub use domain::registry::{NodeRegistry, PendingPublications};
pub use ports::inbound::{
    DiscoveryHandler, NodeConfigHandler, NodeInputHandler, PollHandler, PublisherHooks,
};
pub use ports::outbound::{IdentityStore, NodeStore, StoreError};
pub use service::{PublisherRuntime, RuntimeStats, RuntimeStatus};

//! # Shared Types Crate
//!
//! Types shared by every publisher crate: the hierarchical address codec,
//! the reserved message vocabulary, fixed-format timestamps, node/input/output
//! entities, identity documents and the command payloads carried inside
//! signed envelopes.
//!
//! ## Design Principles
//!
//! - **Address is the routing key**: the trailing segment alone decides what
//!   a message means, so classification never looks at the payload.
//! - **Sortable time**: every timestamp written by this workspace uses one
//!   fixed-width UTC format, which makes lexical comparison valid.

pub mod address;
pub mod entities;
pub mod errors;
pub mod identity;
pub mod messages;
pub mod timestamp;

pub use address::{identity_address, Address, MessageKind};
pub use entities::*;
pub use errors::AddressError;
pub use identity::{FullIdentity, IdentitySigningFields, PublicIdentity, ISSUER_PUBLISHER_ID};
pub use messages::{NodeConfigureMessage, SetInputMessage};
pub use timestamp::{format_timestamp, now_timestamp, timestamp_after, timestamp_before};

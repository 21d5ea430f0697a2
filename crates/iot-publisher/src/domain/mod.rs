//! # Domain Layer
//!
//! Identity lifecycle, envelope protocol, peer directory and node registry.
//! Nothing in here touches the network or the filesystem directly.

pub mod envelope;
pub mod errors;
pub mod identity;
pub mod peers;
pub mod registry;

//! # Adapters
//!
//! Implementations of the outbound ports.

pub mod file_store;

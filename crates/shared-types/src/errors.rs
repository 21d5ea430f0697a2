//! # Error Types
//!
//! Errors raised while building or parsing addresses.

use thiserror::Error;

/// A malformed address. Always surfaced to the caller that asked for the
/// address; never repaired.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Fewer segments than the address shape requires.
    #[error("Malformed address '{address}': {found} segments, at least {required} required")]
    Malformed {
        address: String,
        found: usize,
        required: usize,
    },

    /// Segment replacement outside the address.
    #[error("Malformed address '{address}': no segment at index {index}")]
    SegmentOutOfRange { address: String, index: usize },

    /// More segments than the address shape allows.
    #[error("Malformed address '{address}': {found} segments, at most {allowed} allowed")]
    TooManySegments {
        address: String,
        found: usize,
        allowed: usize,
    },
}

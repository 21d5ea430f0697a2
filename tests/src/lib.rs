//! # IoT Publisher Test Suite
//!
//! Cross-crate flows: several publisher runtimes on one in-memory bus,
//! file backed stores and hostile frames injected straight onto the bus.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── identity_flows.rs   # persistence, peer admission, issuer updates
//!     ├── command_flows.rs    # set and configure between publishers
//!     ├── envelope_flows.rs   # tampered and re-targeted frames
//!     └── heartbeat_flows.rs  # poll and discovery cadence
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p iot-tests
//! cargo test -p iot-tests integration::identity_flows
//! ```

pub mod integration;

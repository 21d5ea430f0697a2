//! # Shared Bus - Topic Transport
//!
//! The publish/subscribe seam between publishers and the message bus.
//!
//! ## Model
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Publisher A  │                    │ Publisher B  │
//! │              │  publish(topic)    │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │ handler(topic, bytes)
//!                  │  Transport   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe(pattern)
//! ```
//!
//! Topics are `/` separated addresses. Subscription patterns may use `+`
//! for exactly one segment and a trailing `#` for any remainder.
//!
//! ## Trust
//!
//! The transport is untrusted. It carries opaque bytes and makes no claim
//! about who sent them; authentication happens in the message envelope.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use publisher::{InMemoryBus, Transport, TransportError};
pub use subscriber::{MessageHandler, SubscriptionId, TopicFilter};

//! # Publisher Runtime
//!
//! Wires the domain together: a heartbeat loop publishing discovery and
//! output values, and bus subscriptions feeding verified control messages
//! to the application hooks.
//!
//! Locks are never held across signing, encryption, transport calls or
//! hook invocations.

mod handlers;
mod lifecycle;
mod outbound;
mod runtime;


pub use runtime::{PublisherRuntime, RuntimeStats, RuntimeStatus};

//! # Ports
//!
//! - `inbound`: hooks the application registers with the runtime
//! - `outbound`: storage the runtime requires from the host

pub mod inbound;
pub mod outbound;

//! # Command Payloads
//!
//! Payloads carried inside signed envelopes. Sender, address and timestamp
//! live in the envelope, so payloads never repeat them.

use crate::entities::NodeAttrMap;
use serde::{Deserialize, Serialize};

/// Payload of a `$set` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetInputMessage {
    pub value: String,
}

/// Payload of a `$configure` command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeConfigureMessage {
    pub attr: NodeAttrMap,
}

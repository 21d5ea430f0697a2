//! # Driving Ports (Application Hooks)
//!
//! Optional callbacks the application registers with the runtime. An absent
//! hook disables the feature; it is never an error.
//!
//! Hooks receive the runtime handle so they can update outputs or nodes.
//! They run without any runtime lock held.

use crate::domain::envelope::VerifiedMessage;
use crate::service::PublisherRuntime;
use shared_types::{Input, Node, NodeAttrMap, SetInputMessage};
use std::sync::Arc;

/// Filters a verified configure request for `node`; the returned attributes
/// are applied. Return an empty map to reject everything.
pub type NodeConfigHandler =
    Arc<dyn Fn(&PublisherRuntime, &Node, &NodeAttrMap) -> NodeAttrMap + Send + Sync>;

/// Handles a verified set command for `input`.
pub type NodeInputHandler =
    Arc<dyn Fn(&PublisherRuntime, &Input, &VerifiedMessage<SetInputMessage>) + Send + Sync>;

/// Invoked once per discovery interval, without waiting for it to finish.
pub type DiscoveryHandler = Arc<dyn Fn(&PublisherRuntime) + Send + Sync>;

/// Invoked once per poll interval. The tick waits for it, so output values
/// it updates go out with that same tick.
pub type PollHandler = Arc<dyn Fn(&PublisherRuntime) + Send + Sync>;

/// The set of registered hooks.
#[derive(Clone, Default)]
pub struct PublisherHooks {
    pub on_node_config: Option<NodeConfigHandler>,
    pub on_node_input: Option<NodeInputHandler>,
    pub on_discovery: Option<DiscoveryHandler>,
    pub on_poll: Option<PollHandler>,
}

impl std::fmt::Debug for PublisherHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherHooks")
            .field("on_node_config", &self.on_node_config.is_some())
            .field("on_node_input", &self.on_node_input.is_some())
            .field("on_discovery", &self.on_discovery.is_some())
            .field("on_poll", &self.on_poll.is_some())
            .finish()
    }
}

//! # Domain Entities
//!
//! Nodes, inputs and outputs exposed by a publisher, and the latest value
//! of each output. These are the payloads of discovery publications.

use crate::address::{Address, MessageKind};
use crate::errors::AddressError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Instance used when a node has a single input or output of a type.
pub const DEFAULT_INSTANCE: &str = "0";

/// Free-form node attributes, also the payload of configure commands.
pub type NodeAttrMap = BTreeMap<String, String>;

/// A configurable node attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigAttr {
    /// Value used while `value` is empty.
    #[serde(default)]
    pub default: String,
    /// Currently configured value.
    #[serde(default)]
    pub value: String,
    /// Human readable description.
    #[serde(default)]
    pub description: String,
}

impl ConfigAttr {
    /// A config attribute with a default and no value yet.
    #[must_use]
    pub fn with_default(default: &str, description: &str) -> Self {
        Self {
            default: default.to_string(),
            value: String::new(),
            description: description.to_string(),
        }
    }

    /// The configured value, or the default when none is set.
    #[must_use]
    pub fn effective_value(&self) -> &str {
        if self.value.is_empty() {
            &self.default
        } else {
            &self.value
        }
    }
}

/// A device or service exposed by a publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Discovery address, `domain/publisher/node/$node`.
    pub address: String,
    pub node_id: String,
    pub node_type: String,
    #[serde(default)]
    pub attr: NodeAttrMap,
    #[serde(default)]
    pub config: BTreeMap<String, ConfigAttr>,
}

impl Node {
    /// Create a node owned by `publisher_id`.
    pub fn new(
        domain: &str,
        publisher_id: &str,
        node_id: &str,
        node_type: &str,
    ) -> Result<Self, AddressError> {
        let address = Address::node(domain, publisher_id, node_id, MessageKind::NodeDiscovery)?;
        Ok(Self {
            address: address.to_string(),
            node_id: node_id.to_string(),
            node_type: node_type.to_string(),
            attr: NodeAttrMap::new(),
            config: BTreeMap::new(),
        })
    }

    /// Effective value of a config attribute.
    #[must_use]
    pub fn config_value(&self, name: &str) -> Option<&str> {
        self.config.get(name).map(ConfigAttr::effective_value)
    }

    /// Apply configuration values. Only attributes the node declares are
    /// touched; returns true if anything changed.
    pub fn apply_config(&mut self, values: &NodeAttrMap) -> bool {
        let mut changed = false;
        for (name, value) in values {
            if let Some(attr) = self.config.get_mut(name) {
                if attr.value != *value {
                    attr.value.clone_from(value);
                    changed = true;
                }
            }
        }
        changed
    }
}

/// A settable data point on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Discovery address, `domain/publisher/node/type/instance/$input`.
    pub address: String,
    pub node_id: String,
    pub input_type: String,
    pub instance: String,
}

impl Input {
    pub fn new(
        domain: &str,
        publisher_id: &str,
        node_id: &str,
        input_type: &str,
        instance: &str,
    ) -> Result<Self, AddressError> {
        let address = Address::io(
            domain,
            publisher_id,
            node_id,
            input_type,
            instance,
            MessageKind::InputDiscovery,
        )?;
        Ok(Self {
            address: address.to_string(),
            node_id: node_id.to_string(),
            input_type: input_type.to_string(),
            instance: instance.to_string(),
        })
    }
}

/// A data point a node reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Discovery address, `domain/publisher/node/type/instance/$output`.
    pub address: String,
    pub node_id: String,
    pub output_type: String,
    pub instance: String,
}

impl Output {
    pub fn new(
        domain: &str,
        publisher_id: &str,
        node_id: &str,
        output_type: &str,
        instance: &str,
    ) -> Result<Self, AddressError> {
        let address = Address::io(
            domain,
            publisher_id,
            node_id,
            output_type,
            instance,
            MessageKind::OutputDiscovery,
        )?;
        Ok(Self {
            address: address.to_string(),
            node_id: node_id.to_string(),
            output_type: output_type.to_string(),
            instance: instance.to_string(),
        })
    }
}

/// Latest value of an output, published on its `$raw` address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputValue {
    /// Value address, `domain/publisher/node/type/instance/$raw`.
    pub address: String,
    pub value: String,
    pub timestamp: String,
}

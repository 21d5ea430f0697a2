//! # Node Registry
//!
//! Nodes, inputs and outputs of the local publisher and the latest value of
//! each output. Every change marks the item pending; the heartbeat takes the
//! pending set once per tick and publishes it.

use shared_types::{ConfigAttr, Input, Node, NodeAttrMap, Output, OutputValue};
use std::collections::{BTreeMap, BTreeSet};

/// Everything that needs publishing, taken in one go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingPublications {
    pub identity: bool,
    pub nodes: Vec<Node>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub values: Vec<OutputValue>,
}

impl PendingPublications {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.identity
            && self.nodes.is_empty()
            && self.inputs.is_empty()
            && self.outputs.is_empty()
            && self.values.is_empty()
    }
}

/// Local nodes and their data points, keyed by node id and discovery address.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, Node>,
    inputs: BTreeMap<String, Input>,
    outputs: BTreeMap<String, Output>,
    values: BTreeMap<String, OutputValue>,
    identity_pending: bool,
    pending_nodes: BTreeSet<String>,
    pending_inputs: BTreeSet<String>,
    pending_outputs: BTreeSet<String>,
    pending_values: BTreeSet<String>,
}

impl NodeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node.
    pub fn add_node(&mut self, node: Node) {
        self.pending_nodes.insert(node.node_id.clone());
        self.nodes.insert(node.node_id.clone(), node);
    }

    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    /// Set a free-form node attribute. Returns false for an unknown node.
    pub fn set_node_attr(&mut self, node_id: &str, name: &str, value: &str) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        node.attr.insert(name.to_string(), value.to_string());
        self.pending_nodes.insert(node_id.to_string());
        true
    }

    /// Declare a configurable attribute. Returns false for an unknown node.
    pub fn declare_config(&mut self, node_id: &str, name: &str, attr: ConfigAttr) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        node.config.insert(name.to_string(), attr);
        self.pending_nodes.insert(node_id.to_string());
        true
    }

    /// Apply configuration values to a node.
    ///
    /// Returns `None` for an unknown node, otherwise whether anything changed.
    pub fn update_node_config(&mut self, node_id: &str, values: &NodeAttrMap) -> Option<bool> {
        let node = self.nodes.get_mut(node_id)?;
        let changed = node.apply_config(values);
        if changed {
            self.pending_nodes.insert(node_id.to_string());
        }
        Some(changed)
    }

    /// Merge stored nodes: configured values are restored onto known
    /// nodes, unknown nodes are added as stored.
    pub fn restore_nodes(&mut self, stored: Vec<Node>) {
        for node in stored {
            match self.nodes.get_mut(&node.node_id) {
                Some(existing) => {
                    let values: NodeAttrMap = node
                        .config
                        .iter()
                        .filter(|(_, attr)| !attr.value.is_empty())
                        .map(|(name, attr)| (name.clone(), attr.value.clone()))
                        .collect();
                    existing.apply_config(&values);
                    self.pending_nodes.insert(node.node_id.clone());
                }
                None => self.add_node(node),
            }
        }
    }

    pub fn add_input(&mut self, input: Input) {
        self.pending_inputs.insert(input.address.clone());
        self.inputs.insert(input.address.clone(), input);
    }

    /// Input by discovery address.
    #[must_use]
    pub fn input(&self, address: &str) -> Option<&Input> {
        self.inputs.get(address)
    }

    #[must_use]
    pub fn inputs(&self) -> Vec<Input> {
        self.inputs.values().cloned().collect()
    }

    pub fn add_output(&mut self, output: Output) {
        self.pending_outputs.insert(output.address.clone());
        self.outputs.insert(output.address.clone(), output);
    }

    /// Output by discovery address.
    #[must_use]
    pub fn output(&self, address: &str) -> Option<&Output> {
        self.outputs.get(address)
    }

    #[must_use]
    pub fn outputs(&self) -> Vec<Output> {
        self.outputs.values().cloned().collect()
    }

    /// Record the latest value of the output at `output_address`, keyed by
    /// that discovery address. Returns false for an unknown output.
    pub fn set_output_value(&mut self, output_address: &str, value: OutputValue) -> bool {
        if !self.outputs.contains_key(output_address) {
            return false;
        }
        self.pending_values.insert(output_address.to_string());
        self.values.insert(output_address.to_string(), value);
        true
    }

    #[must_use]
    pub fn output_value(&self, output_address: &str) -> Option<&OutputValue> {
        self.values.get(output_address)
    }

    pub fn mark_identity_pending(&mut self) {
        self.identity_pending = true;
    }

    /// Mark the identity and all discovery items pending. Output values are
    /// left alone; they go out when they change.
    pub fn mark_all_pending(&mut self) {
        self.identity_pending = true;
        self.pending_nodes.extend(self.nodes.keys().cloned());
        self.pending_inputs.extend(self.inputs.keys().cloned());
        self.pending_outputs.extend(self.outputs.keys().cloned());
    }

    /// Take and clear the pending set.
    pub fn take_pending(&mut self) -> PendingPublications {
        let nodes = std::mem::take(&mut self.pending_nodes);
        let inputs = std::mem::take(&mut self.pending_inputs);
        let outputs = std::mem::take(&mut self.pending_outputs);
        let values = std::mem::take(&mut self.pending_values);

        PendingPublications {
            identity: std::mem::take(&mut self.identity_pending),
            nodes: nodes.iter().filter_map(|id| self.nodes.get(id).cloned()).collect(),
            inputs: inputs.iter().filter_map(|a| self.inputs.get(a).cloned()).collect(),
            outputs: outputs.iter().filter_map(|a| self.outputs.get(a).cloned()).collect(),
            values: values.iter().filter_map(|a| self.values.get(a).cloned()).collect(),
        }
    }
}

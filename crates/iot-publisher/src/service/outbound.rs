//! Outbound commands and discovery publication.

use super::runtime::{Counters, PublisherRuntime};
use crate::domain::envelope::SecureEnvelope;
use crate::domain::errors::PublisherError;
use serde::Serialize;
use shared_types::{
    Address, AddressError, MessageKind, NodeAttrMap, NodeConfigureMessage, SetInputMessage,
};
use tracing::{debug, trace, warn};

impl PublisherRuntime {
    /// Ask the owner of an input to set it to `value`.
    ///
    /// `input_address` is any input-level address of the input, normally its
    /// discovery address. The command is sealed to the owning publisher.
    ///
    /// # Returns
    ///
    /// The number of bus subscribers that received the command.
    ///
    /// # Errors
    ///
    /// A malformed address, an owner not in the peer directory, or a
    /// transport failure.
    pub fn publish_set_input(&self, input_address: &str, value: &str) -> Result<usize, PublisherError> {
        let address = Address::parse(input_address)?;
        let (Some(node_id), Some(input_type), Some(instance)) =
            (address.node_id(), address.io_type(), address.instance())
        else {
            return Err(too_short(&address, MessageKind::Set));
        };
        let allowed = MessageKind::Set.min_segments();
        if address.len() > allowed {
            return Err(AddressError::TooManySegments {
                address: address.to_string(),
                found: address.len(),
                allowed,
            }
            .into());
        }
        let target = Address::io(
            address.domain(),
            address.publisher_id(),
            node_id,
            input_type,
            instance,
            MessageKind::Set,
        )?;
        self.publish_command(
            &target,
            &SetInputMessage {
                value: value.to_string(),
            },
        )
    }

    /// Ask the owner of a node to apply configuration values.
    ///
    /// `node_address` is any address of the node. The command is sealed to
    /// the owning publisher.
    pub fn publish_node_configure(
        &self,
        node_address: &str,
        attr: &NodeAttrMap,
    ) -> Result<usize, PublisherError> {
        let address = Address::parse(node_address)?;
        let Some(node_id) = address.node_id() else {
            return Err(too_short(&address, MessageKind::Configure));
        };
        let target = Address::node(
            address.domain(),
            address.publisher_id(),
            node_id,
            MessageKind::Configure,
        )?;
        self.publish_command(&target, &NodeConfigureMessage { attr: attr.clone() })
    }

    fn publish_command<T: Serialize>(
        &self,
        address: &Address,
        payload: &T,
    ) -> Result<usize, PublisherError> {
        let recipient = address.publisher_id();
        let key = self
            .sender_key(recipient)
            .ok_or_else(|| PublisherError::UnknownRecipient(recipient.to_string()))?;

        let identity = self.local_identity();
        let topic = address.to_string();
        let raw = SecureEnvelope::new(identity.publisher_id(), identity.keys())
            .publish(&topic, payload, Some(&key))?;
        let receivers = self.inner.transport.publish(&topic, &raw)?;

        Counters::bump(&self.inner.counters.published);
        debug!(address = %topic, receivers, "Command published");
        Ok(receivers)
    }

    /// Publish everything pending: identity, nodes, inputs, outputs and
    /// output values, in that order. Returns the number of frames published.
    ///
    /// Runs on every tick. Transport failures are logged and the item is
    /// not retried until it changes or discovery comes round again.
    pub fn publish_updates(&self) -> usize {
        let (identity, pending) = {
            let mut state = self.inner.state.lock();
            (state.identity.clone(), state.registry.take_pending())
        };
        if pending.is_empty() {
            return 0;
        }

        let envelope = SecureEnvelope::new(identity.publisher_id(), identity.keys());
        let mut published = 0;
        if pending.identity {
            let document = identity.document();
            published += usize::from(self.publish_signed(&envelope, &document.address, document));
        }
        for node in &pending.nodes {
            published += usize::from(self.publish_signed(&envelope, &node.address, node));
        }
        for input in &pending.inputs {
            published += usize::from(self.publish_signed(&envelope, &input.address, input));
        }
        for output in &pending.outputs {
            published += usize::from(self.publish_signed(&envelope, &output.address, output));
        }
        for value in &pending.values {
            published += usize::from(self.publish_signed(&envelope, &value.address, value));
        }

        trace!(published, "Pending publications sent");
        published
    }

    fn publish_signed<T: Serialize>(
        &self,
        envelope: &SecureEnvelope<'_>,
        address: &str,
        payload: &T,
    ) -> bool {
        let sent = envelope
            .publish(address, payload, None)
            .and_then(|raw| {
                self.inner
                    .transport
                    .publish(address, &raw)
                    .map_err(PublisherError::from)
            });
        match sent {
            Ok(_) => {
                Counters::bump(&self.inner.counters.published);
                true
            }
            Err(error) => {
                warn!(address = address, error = %error, "Publication failed");
                false
            }
        }
    }
}

fn too_short(address: &Address, kind: MessageKind) -> PublisherError {
    AddressError::Malformed {
        address: address.to_string(),
        found: address.len(),
        required: kind.min_segments(),
    }
    .into()
}

//! Inbound control messages.
//!
//! Every message passes the address check and the envelope before it has
//! any effect. Failures are logged, counted and dropped.

use super::runtime::{Counters, PublisherRuntime, RuntimeInner};
use crate::domain::envelope::{SecureEnvelope, VerifiedMessage};
use crate::domain::errors::{DiscardReason, PublisherError};
use shared_bus::MessageHandler;
use shared_types::address::WILDCARD;
use shared_types::{
    Address, FullIdentity, MessageKind, NodeConfigureMessage, SetInputMessage,
    ISSUER_PUBLISHER_ID,
};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

impl PublisherRuntime {
    /// Subscription patterns for the control messages this runtime accepts.
    pub(crate) fn inbound_patterns(&self) -> Vec<String> {
        let domain = self.domain();
        let publisher = self.publisher_id();
        vec![
            format!("{domain}/{publisher}/{WILDCARD}/{}", MessageKind::Configure),
            format!(
                "{domain}/{publisher}/{WILDCARD}/{WILDCARD}/{WILDCARD}/{}",
                MessageKind::Set
            ),
            format!("{domain}/{WILDCARD}/{}", MessageKind::Identity),
            format!("{domain}/{publisher}/{}", MessageKind::IdentityUpdate),
        ]
    }

    pub(crate) fn subscribe_inbound(&self) -> Result<(), PublisherError> {
        let weak: Weak<RuntimeInner> = Arc::downgrade(&self.inner);
        for pattern in self.inbound_patterns() {
            let weak = weak.clone();
            let handler: MessageHandler = Arc::new(move |topic: &str, raw: &[u8]| {
                if let Some(inner) = weak.upgrade() {
                    PublisherRuntime { inner }.handle_message(topic, raw);
                }
            });
            let id = self.inner.transport.subscribe(&pattern, handler)?;
            self.inner.state.lock().subscriptions.push(id);
            debug!(pattern = %pattern, "Subscribed");
        }
        Ok(())
    }

    pub(crate) fn unsubscribe_inbound(&self) {
        let subscriptions = std::mem::take(&mut self.inner.state.lock().subscriptions);
        for id in subscriptions {
            if let Err(error) = self.inner.transport.unsubscribe(id) {
                warn!(error = %error, "Failed to unsubscribe");
            }
        }
    }

    /// Route one raw message by the kind its topic names.
    ///
    /// Called by the transport subscriptions; a transport adapter that
    /// delivers messages itself may call it directly.
    pub fn handle_message(&self, topic: &str, raw: &[u8]) {
        let address = match Address::parse(topic) {
            Ok(address) => address,
            Err(error) => {
                self.discard(topic, &DiscardReason::MalformedEnvelope(error.to_string()));
                return;
            }
        };
        if address.domain() != self.domain() {
            trace!(topic = topic, "Ignoring message for another domain");
            return;
        }

        match address.kind() {
            Some(MessageKind::Identity) => self.handle_identity(&address, topic, raw),
            Some(kind) if address.publisher_id() != self.publisher_id() => {
                trace!(topic = topic, kind = %kind, "Ignoring message for another publisher");
            }
            Some(MessageKind::Configure) => self.handle_configure(&address, topic, raw),
            Some(MessageKind::Set) => self.handle_set_input(&address, topic, raw),
            Some(MessageKind::IdentityUpdate) => self.handle_identity_update(topic, raw),
            _ => trace!(topic = topic, "Ignoring message kind"),
        }
    }

    fn discard(&self, topic: &str, reason: &DiscardReason) {
        Counters::bump(&self.inner.counters.discarded);
        warn!(topic = topic, reason = %reason, "Message discarded");
    }

    fn open<T: serde::de::DeserializeOwned>(
        &self,
        topic: &str,
        raw: &[u8],
        require_encrypted: bool,
    ) -> Result<VerifiedMessage<T>, DiscardReason> {
        let identity = self.local_identity();
        SecureEnvelope::new(identity.publisher_id(), identity.keys()).open(
            topic,
            raw,
            require_encrypted,
            |sender| self.sender_key(sender),
        )
    }

    fn handle_configure(&self, address: &Address, topic: &str, raw: &[u8]) {
        let require = self.config().require_encrypted_commands;
        let message: VerifiedMessage<NodeConfigureMessage> = match self.open(topic, raw, require) {
            Ok(message) => message,
            Err(reason) => return self.discard(topic, &reason),
        };
        let Some(node_id) = address.node_id() else {
            return self.discard(topic, &DiscardReason::PayloadMismatch("no node id".into()));
        };

        let (node, hook) = {
            let state = self.inner.state.lock();
            (
                state.registry.node(node_id).cloned(),
                state.hooks.on_node_config.clone(),
            )
        };
        let Some(node) = node else {
            return self.discard(
                topic,
                &DiscardReason::PayloadMismatch(format!("unknown node {node_id}")),
            );
        };

        let accepted = match hook {
            Some(hook) => hook(self, &node, &message.payload.attr),
            None => message.payload.attr.clone(),
        };
        let changed = self
            .inner
            .state
            .lock()
            .registry
            .update_node_config(node_id, &accepted)
            .unwrap_or(false);

        info!(
            node = node_id,
            sender = %message.sender,
            requested = message.payload.attr.len(),
            accepted = accepted.len(),
            changed,
            "Node configure request applied"
        );
        if changed {
            self.save_nodes();
        }
    }

    fn handle_set_input(&self, address: &Address, topic: &str, raw: &[u8]) {
        let require = self.config().require_encrypted_commands;
        let message: VerifiedMessage<SetInputMessage> = match self.open(topic, raw, require) {
            Ok(message) => message,
            Err(reason) => return self.discard(topic, &reason),
        };
        let input_address = match address.with_kind(MessageKind::InputDiscovery) {
            Ok(input_address) => input_address.to_string(),
            Err(error) => {
                return self.discard(topic, &DiscardReason::PayloadMismatch(error.to_string()))
            }
        };

        let (input, hook) = {
            let state = self.inner.state.lock();
            (
                state.registry.input(&input_address).cloned(),
                state.hooks.on_node_input.clone(),
            )
        };
        let Some(input) = input else {
            return self.discard(
                topic,
                &DiscardReason::PayloadMismatch(format!("unknown input {input_address}")),
            );
        };

        match hook {
            Some(hook) => {
                debug!(input = %input.address, sender = %message.sender, "Set input request");
                hook(self, &input, &message);
            }
            None => warn!(input = %input.address, "No input handler, set request ignored"),
        }
    }

    fn handle_identity(&self, address: &Address, topic: &str, raw: &[u8]) {
        if address.publisher_id() == self.publisher_id() {
            trace!("Ignoring own identity broadcast");
            return;
        }
        let identity = self.local_identity();
        let envelope = SecureEnvelope::new(identity.publisher_id(), identity.keys());
        let admitted = envelope
            .decode(topic, raw, false)
            .and_then(|frame| self.inner.peers.admit(self.domain(), &frame));
        match admitted {
            Ok(document) => debug!(
                peer = %document.publisher_id,
                valid_until = %document.valid_until,
                "Peer identity admitted"
            ),
            Err(reason) => self.discard(topic, &reason),
        }
    }

    fn handle_identity_update(&self, topic: &str, raw: &[u8]) {
        let message: VerifiedMessage<FullIdentity> = match self.open(topic, raw, true) {
            Ok(message) => message,
            Err(reason) => return self.discard(topic, &reason),
        };
        let issuer_key = self.inner.peers.get_public_key(ISSUER_PUBLISHER_ID);
        let manager = &self.inner.identity_manager;
        let updated = match manager.apply_issued_update(&message, issuer_key.as_ref()) {
            Ok(updated) => updated,
            Err(error) => {
                return self.discard(topic, &DiscardReason::PayloadMismatch(error.to_string()))
            }
        };

        if let Some(store) = &self.inner.identity_store {
            if let Err(error) = manager.persist(store.as_ref(), &updated) {
                warn!(error = %error, "Failed to persist issued identity, using it in memory");
            }
        }
        {
            let mut state = self.inner.state.lock();
            state.identity = Arc::new(updated);
            state.registry.mark_identity_pending();
        }
        info!(publisher = %self.publisher_id(), "Identity replaced by issuer");
        self.publish_updates();
    }
}

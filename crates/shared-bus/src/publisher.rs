//! # Transport
//!
//! Defines the publishing side of the bus and an in-memory implementation.

use crate::subscriber::{MessageHandler, SubscriptionId, TopicFilter};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors reported by a transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The subscription pattern cannot be used.
    #[error("Invalid subscription pattern: {0}")]
    InvalidPattern(String),

    /// The transport is not connected.
    #[error("Transport disconnected")]
    Disconnected,

    /// Publishing failed.
    #[error("Publish to {address} failed: {reason}")]
    PublishFailed {
        /// Topic the message was addressed to
        address: String,
        /// Transport specific reason
        reason: String,
    },
}

/// Interface publishers use to reach the bus.
///
/// Implementations deliver every published message to each handler whose
/// pattern matches the topic. Subscriptions are independent: two handlers
/// on the same pattern both receive the message.
pub trait Transport: Send + Sync {
    /// Publish bytes on a topic.
    ///
    /// # Returns
    ///
    /// The number of subscribers that received the message.
    fn publish(&self, address: &str, payload: &[u8]) -> Result<usize, TransportError>;

    /// Register `handler` for topics matching `pattern`.
    fn subscribe(
        &self,
        pattern: &str,
        handler: MessageHandler,
    ) -> Result<SubscriptionId, TransportError>;

    /// Remove a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TransportError>;
}

/// In-memory implementation of the bus.
///
/// Delivery is synchronous: `publish` invokes matching handlers before it
/// returns. Handlers are called outside the subscription lock, so they may
/// publish or subscribe themselves.
pub struct InMemoryBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
    messages_published: AtomicU64,
}

struct Subscription {
    id: SubscriptionId,
    filter: TopicFilter,
    handler: MessageHandler,
}

impl InMemoryBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            messages_published: AtomicU64::new(0),
        }
    }

    /// Get the number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Get the total number of messages published.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for InMemoryBus {
    fn publish(&self, address: &str, payload: &[u8]) -> Result<usize, TransportError> {
        // Always increment counter (message was attempted)
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let handlers: Vec<MessageHandler> = self
            .subscriptions
            .read()
            .iter()
            .filter(|subscription| subscription.filter.matches(address))
            .map(|subscription| subscription.handler.clone())
            .collect();

        if handlers.is_empty() {
            debug!(address = address, "Message dropped (no receivers)");
            return Ok(0);
        }

        for handler in &handlers {
            handler(address, payload);
        }
        debug!(
            address = address,
            receivers = handlers.len(),
            bytes = payload.len(),
            "Message published"
        );
        Ok(handlers.len())
    }

    fn subscribe(
        &self,
        pattern: &str,
        handler: MessageHandler,
    ) -> Result<SubscriptionId, TransportError> {
        let Some(filter) = TopicFilter::parse(pattern) else {
            warn!(pattern = pattern, "Rejected subscription pattern");
            return Err(TransportError::InvalidPattern(pattern.to_string()));
        };

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription {
            id,
            filter,
            handler,
        });
        debug!(pattern = pattern, id = id.0, "New subscription created");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TransportError> {
        self.subscriptions
            .write()
            .retain(|subscription| subscription.id != id);
        debug!(id = id.0, "Subscription removed");
        Ok(())
    }
}

//! # Envelope Flows
//!
//! Hostile frames injected straight onto the bus: tampered bytes,
//! re-targeted commands and unauthenticated senders.

#[cfg(test)]
mod tests {
    use super::super::support::*;
    use iot_publisher::{IdentityManager, LocalIdentity, PublisherRuntime, SecureEnvelope, VerifiedMessage};
    use shared_bus::Transport;
    use shared_types::{Input, SetInputMessage};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    const SET_TOPIC: &str = "test/device/node1/switch/0/$set";

    fn set_on() -> SetInputMessage {
        SetInputMessage {
            value: "on".to_string(),
        }
    }

    /// A started device with a counting input hook that trusts `controller`.
    async fn device_trusting(
        bus: &Arc<shared_bus::InMemoryBus>,
        controller: &LocalIdentity,
    ) -> (PublisherRuntime, Arc<AtomicU64>) {
        let device = runtime(bus, "device");
        add_switch(&device);
        device
            .peers()
            .upsert(controller.document().clone(), controller.public_key());
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        device.on_node_input(Arc::new(
            move |_: &PublisherRuntime, _: &Input, _: &VerifiedMessage<SetInputMessage>| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));
        device.start().await.unwrap();
        (device, calls)
    }

    fn controller() -> LocalIdentity {
        IdentityManager::new(DOMAIN, "controller").generate().unwrap()
    }

    #[tokio::test]
    async fn test_every_flipped_byte_rejected() {
        let bus = new_bus();
        let controller = controller();
        let (device, calls) = device_trusting(&bus, &controller).await;
        let envelope = SecureEnvelope::new("controller", controller.keys());

        for sealed in [false, true] {
            let recipient = sealed.then(|| device.public_key());
            let raw = envelope
                .publish(SET_TOPIC, &set_on(), recipient.as_ref())
                .unwrap();

            for index in 0..raw.len() {
                let mut tampered = raw.clone();
                tampered[index] ^= 0x01;
                bus.publish(SET_TOPIC, &tampered).unwrap();
            }
            assert_eq!(calls.load(Ordering::SeqCst), 0, "sealed: {sealed}");

            // the untouched frame still goes through
            bus.publish(SET_TOPIC, &raw).unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        device.stop().await;
    }

    #[tokio::test]
    async fn test_retargeted_command_discarded() {
        let bus = new_bus();
        let controller = controller();
        let (device, calls) = device_trusting(&bus, &controller).await;
        device
            .create_input("node1", "switch", "1")
            .unwrap();

        // a valid command for instance 0 replayed on the topic of instance 1
        let raw = SecureEnvelope::new("controller", controller.keys())
            .publish(SET_TOPIC, &set_on(), Some(&device.public_key()))
            .unwrap();
        bus.publish("test/device/node1/switch/1/$set", &raw).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(device.stats().discarded, 1);
        device.stop().await;
    }

    #[tokio::test]
    async fn test_sealed_for_someone_else_discarded() {
        let bus = new_bus();
        let controller = controller();
        let (device, calls) = device_trusting(&bus, &controller).await;
        let bystander = IdentityManager::new(DOMAIN, "bystander").generate().unwrap();

        let raw = SecureEnvelope::new("controller", controller.keys())
            .publish(SET_TOPIC, &set_on(), Some(&bystander.public_key()))
            .unwrap();
        bus.publish(SET_TOPIC, &raw).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(device.stats().discarded, 1);
        device.stop().await;
    }

    #[tokio::test]
    async fn test_sender_impersonation_discarded() {
        let bus = new_bus();
        let controller = controller();
        let (device, calls) = device_trusting(&bus, &controller).await;

        // signed by another key but claiming to be the controller
        let impostor = IdentityManager::new(DOMAIN, "controller").generate().unwrap();
        let raw = SecureEnvelope::new("controller", impostor.keys())
            .publish(SET_TOPIC, &set_on(), Some(&device.public_key()))
            .unwrap();
        bus.publish(SET_TOPIC, &raw).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(device.stats().discarded, 1);
        device.stop().await;
    }

    #[tokio::test]
    async fn test_garbage_and_malformed_topics_discarded() {
        let bus = new_bus();
        let controller = controller();
        let (device, calls) = device_trusting(&bus, &controller).await;

        bus.publish(SET_TOPIC, b"").unwrap();
        bus.publish(SET_TOPIC, b"{}").unwrap();
        bus.publish(SET_TOPIC, br#"{"framing":"sealed"}"#).unwrap();
        device.handle_message("test", b"{}");

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(device.stats().discarded, 4);
        device.stop().await;
    }
}

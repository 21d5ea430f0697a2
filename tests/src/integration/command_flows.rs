//! # Command Flows
//!
//! Set and configure commands between publishers sharing one bus.

#[cfg(test)]
mod tests {
    use super::super::support::*;
    use iot_publisher::{PublisherError, PublisherRuntime, VerifiedMessage};
    use shared_types::{ConfigAttr, Input, Node, NodeAttrMap, SetInputMessage, DEFAULT_INSTANCE};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Input hook that copies the requested value to the matching output.
    fn echo_to_output(runtime: &PublisherRuntime) {
        runtime.on_node_input(Arc::new(
            |runtime: &PublisherRuntime, input: &Input, message: &VerifiedMessage<SetInputMessage>| {
                runtime
                    .update_output_value(
                        &input.node_id,
                        &input.input_type,
                        &input.instance,
                        &message.payload.value,
                    )
                    .unwrap();
            },
        ));
    }

    fn counting_input_hook(runtime: &PublisherRuntime) -> Arc<AtomicU64> {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        runtime.on_node_input(Arc::new(
            move |_: &PublisherRuntime, _: &Input, _: &VerifiedMessage<SetInputMessage>| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));
        calls
    }

    // =========================================================================
    // SET INPUT
    // =========================================================================

    #[tokio::test]
    async fn test_set_updates_output_and_value_is_published() {
        let bus = new_bus();
        let values = record(&bus, "test/device/+/+/+/$raw");
        let controller = runtime(&bus, "controller");
        let device = runtime(&bus, "device");
        add_switch(&device);
        echo_to_output(&device);
        start_all(&[&controller, &device]).await;

        let receivers = controller
            .publish_set_input("test/device/node1/switch/0/$input", "on")
            .unwrap();
        assert_eq!(receivers, 1);
        assert_eq!(
            device
                .get_output_value("test/device/node1/switch/0/$output")
                .unwrap()
                .value,
            "on"
        );

        // the next tick publishes the new value
        tokio::time::sleep(Duration::from_millis(80)).await;
        stop_all(&[&controller, &device]).await;

        let values = values.lock();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].0, "test/device/node1/switch/0/$raw");
    }

    #[tokio::test]
    async fn test_set_for_other_publisher_never_reaches_hook() {
        let bus = new_bus();
        let controller = runtime(&bus, "controller");
        let device = runtime(&bus, "device");
        let absent = runtime(&bus, "absent");
        add_switch(&device);
        add_switch(&absent);
        let calls = counting_input_hook(&device);
        start_all(&[&controller, &device, &absent]).await;

        // `absent` is known to the controller but no longer listening
        absent.stop().await;
        let receivers = controller
            .publish_set_input("test/absent/node1/switch/0/$input", "on")
            .unwrap();

        assert_eq!(receivers, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(device.stats().discarded, 0);

        stop_all(&[&controller, &device]).await;
    }

    #[test]
    fn test_set_before_peer_is_known() {
        let bus = new_bus();
        let controller = runtime(&bus, "controller");

        let result = controller.publish_set_input("test/device/node1/switch/0/$input", "on");
        assert!(matches!(result, Err(PublisherError::UnknownRecipient(id)) if id == "device"));
    }

    #[tokio::test]
    async fn test_set_without_input_hook_is_ignored() {
        let bus = new_bus();
        let controller = runtime(&bus, "controller");
        let device = runtime(&bus, "device");
        add_switch(&device);
        start_all(&[&controller, &device]).await;

        controller
            .publish_set_input("test/device/node1/switch/0/$input", "on")
            .unwrap();

        assert!(device
            .get_output_value("test/device/node1/switch/0/$output")
            .is_none());
        assert_eq!(device.stats().discarded, 0);
        stop_all(&[&controller, &device]).await;
    }

    // =========================================================================
    // CONFIGURE
    // =========================================================================

    #[tokio::test]
    async fn test_configure_rejected_by_hook() {
        let bus = new_bus();
        let controller = runtime(&bus, "controller");
        let device = runtime(&bus, "device");
        device.create_node("node1", "sensor").unwrap();
        device
            .declare_node_config("node1", "interval", ConfigAttr::with_default("60", "seconds"))
            .unwrap();
        device.on_node_config(Arc::new(
            |_: &PublisherRuntime, _: &Node, _: &NodeAttrMap| -> NodeAttrMap { NodeAttrMap::new() },
        ));
        start_all(&[&controller, &device]).await;

        let mut attrs = NodeAttrMap::new();
        attrs.insert("interval".to_string(), "1".to_string());
        controller
            .publish_node_configure("test/device/node1/$node", &attrs)
            .unwrap();

        assert_eq!(
            device.get_node("node1").unwrap().config_value("interval"),
            Some("60")
        );
        stop_all(&[&controller, &device]).await;
    }

    #[tokio::test]
    async fn test_configure_ignores_undeclared_attributes() {
        let bus = new_bus();
        let controller = runtime(&bus, "controller");
        let device = runtime(&bus, "device");
        device.create_node("node1", "sensor").unwrap();
        device
            .declare_node_config("node1", "interval", ConfigAttr::with_default("60", "seconds"))
            .unwrap();
        start_all(&[&controller, &device]).await;

        let mut attrs = NodeAttrMap::new();
        attrs.insert("interval".to_string(), "5".to_string());
        attrs.insert("firmware".to_string(), "evil".to_string());
        controller
            .publish_node_configure("test/device/node1/$node", &attrs)
            .unwrap();

        let node = device.get_node("node1").unwrap();
        assert_eq!(node.config_value("interval"), Some("5"));
        assert_eq!(node.config_value("firmware"), None);
        stop_all(&[&controller, &device]).await;
    }

    #[tokio::test]
    async fn test_configure_unknown_node_discarded() {
        let bus = new_bus();
        let controller = runtime(&bus, "controller");
        let device = runtime(&bus, "device");
        start_all(&[&controller, &device]).await;

        let mut attrs = NodeAttrMap::new();
        attrs.insert("name".to_string(), "x".to_string());
        controller
            .publish_node_configure("test/device/ghost/$node", &attrs)
            .unwrap();

        assert_eq!(device.stats().discarded, 1);
        assert!(device.get_nodes().is_empty());
        stop_all(&[&controller, &device]).await;
    }

    #[test]
    fn test_instance_defaults() {
        let bus = new_bus();
        let device = runtime(&bus, "device");
        add_switch(&device);
        let input = device
            .get_input("test/device/node1/switch/0/$input")
            .unwrap();
        assert_eq!(input.instance, DEFAULT_INSTANCE);
    }
}

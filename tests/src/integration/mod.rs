//! Integration flows across shared-types, shared-crypto, shared-bus and
//! iot-publisher.

pub mod command_flows;
pub mod envelope_flows;
pub mod heartbeat_flows;
pub mod identity_flows;

#[cfg(test)]
pub(crate) mod support {
    use iot_publisher::{PublisherConfig, PublisherHooks, PublisherRuntime};
    use parking_lot::Mutex;
    use shared_bus::{InMemoryBus, MessageHandler, Transport};
    use shared_types::DEFAULT_INSTANCE;
    use std::sync::Arc;

    pub const DOMAIN: &str = "test";

    pub fn new_bus() -> Arc<InMemoryBus> {
        Arc::new(InMemoryBus::new())
    }

    pub fn runtime(bus: &Arc<InMemoryBus>, publisher_id: &str) -> PublisherRuntime {
        runtime_with(bus, PublisherConfig::for_testing(DOMAIN, publisher_id))
    }

    pub fn runtime_with(bus: &Arc<InMemoryBus>, config: PublisherConfig) -> PublisherRuntime {
        PublisherRuntime::new(config, bus.clone(), PublisherHooks::default()).unwrap()
    }

    /// Start every runtime, then re-announce so all of them know each other.
    pub async fn start_all(runtimes: &[&PublisherRuntime]) {
        for runtime in runtimes {
            runtime.start().await.unwrap();
        }
        for runtime in runtimes {
            runtime.announce();
        }
    }

    pub async fn stop_all(runtimes: &[&PublisherRuntime]) {
        for runtime in runtimes {
            runtime.stop().await;
        }
    }

    /// Node `node1` with a `switch` input and output.
    pub fn add_switch(runtime: &PublisherRuntime) {
        runtime.create_node("node1", "switch").unwrap();
        runtime.create_input("node1", "switch", DEFAULT_INSTANCE).unwrap();
        runtime.create_output("node1", "switch", DEFAULT_INSTANCE).unwrap();
    }

    /// Record `(topic, bytes)` of every message matching `pattern`.
    pub fn record(bus: &InMemoryBus, pattern: &str) -> Arc<Mutex<Vec<(String, Vec<u8>)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: MessageHandler = Arc::new(move |topic: &str, bytes: &[u8]| {
            sink.lock().push((topic.to_string(), bytes.to_vec()));
        });
        bus.subscribe(pattern, handler).unwrap();
        seen
    }
}

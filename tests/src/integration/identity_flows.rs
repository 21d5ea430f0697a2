//! # Identity Flows
//!
//! Identity persistence through the file store, peer admission from
//! broadcasts, and identity replacement by the issuer.

#[cfg(test)]
mod tests {
    use super::super::support::*;
    use iot_publisher::{
        FileIdentityStore, IdentityManager, IdentityStatus, IdentityStore, PublisherConfig,
        SecureEnvelope,
    };
    use shared_bus::Transport;
    use shared_types::{ConfigAttr, NodeAttrMap, ISSUER_PUBLISHER_ID};
    use tempfile::TempDir;

    fn persistent_config(dir: &TempDir, publisher_id: &str) -> PublisherConfig {
        let mut config = PublisherConfig::for_testing(DOMAIN, publisher_id);
        config.identity_folder = Some(dir.path().join("identity"));
        config.nodes_folder = Some(dir.path().join("nodes"));
        config
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    #[test]
    fn test_identity_survives_restart() {
        let dir = TempDir::new().unwrap();
        let bus = new_bus();

        let first = runtime_with(&bus, persistent_config(&dir, "pub1"));
        let original = first.identity();
        drop(first);

        let second = runtime_with(&bus, persistent_config(&dir, "pub1"));
        assert_eq!(second.identity(), original);
        assert_eq!(
            serde_json::to_vec(&second.identity()).unwrap(),
            serde_json::to_vec(&original).unwrap()
        );
        assert!(dir.path().join("identity").join("pub1-identity.json").exists());
    }

    #[test]
    fn test_corrupt_identity_file_replaced() {
        let dir = TempDir::new().unwrap();
        let bus = new_bus();
        let original = runtime_with(&bus, persistent_config(&dir, "pub1")).identity();

        let path = dir.path().join("identity").join("pub1-identity.json");
        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();

        let replaced = runtime_with(&bus, persistent_config(&dir, "pub1"));
        assert_ne!(replaced.identity().public_key, original.public_key);
        assert_eq!(replaced.identity_status(), IdentityStatus::SelfSigned);

        // the replacement was written back and loads cleanly
        let stored = FileIdentityStore::new(dir.path().join("identity"))
            .load_identity("pub1")
            .unwrap();
        assert_eq!(stored.identity, replaced.identity());
    }

    #[tokio::test]
    async fn test_node_config_restored_after_restart() {
        let dir = TempDir::new().unwrap();
        let bus = new_bus();
        let controller = runtime(&bus, "controller");
        let device = runtime_with(&bus, persistent_config(&dir, "device"));
        add_switch(&device);
        device
            .declare_node_config("node1", "name", ConfigAttr::with_default("switch", ""))
            .unwrap();
        start_all(&[&controller, &device]).await;

        let mut attrs = NodeAttrMap::new();
        attrs.insert("name".to_string(), "kitchen".to_string());
        controller
            .publish_node_configure("test/device/node1/$node", &attrs)
            .unwrap();
        stop_all(&[&controller, &device]).await;
        drop(device);

        // the application registers its node again; the stored value wins
        let device = runtime_with(&bus, persistent_config(&dir, "device"));
        add_switch(&device);
        device
            .declare_node_config("node1", "name", ConfigAttr::with_default("switch", ""))
            .unwrap();
        device.start().await.unwrap();
        assert_eq!(
            device.get_node("node1").unwrap().config_value("name"),
            Some("kitchen")
        );
        device.stop().await;
    }

    // =========================================================================
    // PEER ADMISSION
    // =========================================================================

    #[tokio::test]
    async fn test_peers_learn_each_other() {
        let bus = new_bus();
        let a = runtime(&bus, "pubA");
        let b = runtime(&bus, "pubB");
        let c = runtime(&bus, "pubC");
        start_all(&[&a, &b, &c]).await;

        for (runtime, others) in [
            (&a, ["pubB", "pubC"]),
            (&b, ["pubA", "pubC"]),
            (&c, ["pubA", "pubB"]),
        ] {
            assert_eq!(runtime.peers().publisher_ids(), others.map(String::from).to_vec());
        }
        assert_eq!(a.peers().get_public_key("pubB"), Some(b.public_key()));

        stop_all(&[&a, &b, &c]).await;
    }

    #[tokio::test]
    async fn test_forged_identity_leaves_directory_unchanged() {
        let bus = new_bus();
        let a = runtime(&bus, "pubA");
        let b = runtime(&bus, "pubB");
        start_all(&[&a, &b]).await;
        let before = a.peers().get("pubB").unwrap();
        let discarded = a.stats().discarded;

        let attacker = IdentityManager::new(DOMAIN, "pubB").generate().unwrap();
        let topic = "test/pubB/$identity";
        let forged = SecureEnvelope::new("pubB", attacker.keys())
            .publish(topic, attacker.document(), None)
            .unwrap();
        bus.publish(topic, &forged).unwrap();

        // replaying the genuine document under the attacker's signature
        let replay = SecureEnvelope::new("pubB", attacker.keys())
            .publish(topic, &b.identity(), None)
            .unwrap();
        bus.publish(topic, &replay).unwrap();

        assert_eq!(a.peers().get("pubB").unwrap().public_key, before.public_key);
        assert_eq!(a.peers().get("pubB").unwrap().identity, before.identity);
        assert_eq!(a.stats().discarded, discarded + 2);

        stop_all(&[&a, &b]).await;
    }

    // =========================================================================
    // ISSUER UPDATES
    // =========================================================================

    #[tokio::test]
    async fn test_issued_identity_replaces_and_persists() {
        let dir = TempDir::new().unwrap();
        let bus = new_bus();
        let observer = runtime(&bus, "observer");
        let device = runtime_with(&bus, persistent_config(&dir, "device"));
        start_all(&[&observer, &device]).await;

        let issuer = IdentityManager::new(DOMAIN, ISSUER_PUBLISHER_ID)
            .generate()
            .unwrap();
        let envelope = SecureEnvelope::new(ISSUER_PUBLISHER_ID, issuer.keys());
        let announce = envelope
            .publish("test/dss/$identity", issuer.document(), None)
            .unwrap();
        bus.publish("test/dss/$identity", &announce).unwrap();

        let issued = IdentityManager::new(DOMAIN, "device").issue(&issuer).unwrap();
        let topic = "test/device/$updateidentity";

        let plaintext = envelope.publish(topic, &issued, None).unwrap();
        bus.publish(topic, &plaintext).unwrap();
        assert_eq!(device.identity_status(), IdentityStatus::SelfSigned);

        let sealed = envelope
            .publish(topic, &issued, Some(&device.public_key()))
            .unwrap();
        bus.publish(topic, &sealed).unwrap();

        assert_eq!(device.identity(), issued.identity);
        assert_eq!(device.identity_status(), IdentityStatus::Issued);

        // re-announced and accepted by peers as an issuer rotation
        assert_eq!(
            observer.peers().get("device").unwrap().identity,
            issued.identity
        );

        // persisted for the next start
        let stored = FileIdentityStore::new(dir.path().join("identity"))
            .load_identity("device")
            .unwrap();
        assert_eq!(stored.identity, issued.identity);

        stop_all(&[&observer, &device]).await;
    }

    #[tokio::test]
    async fn test_update_from_impostor_issuer_rejected() {
        let bus = new_bus();
        let device = runtime(&bus, "device");
        device.start().await.unwrap();

        let issuer = IdentityManager::new(DOMAIN, ISSUER_PUBLISHER_ID)
            .generate()
            .unwrap();
        let announce = SecureEnvelope::new(ISSUER_PUBLISHER_ID, issuer.keys())
            .publish("test/dss/$identity", issuer.document(), None)
            .unwrap();
        bus.publish("test/dss/$identity", &announce).unwrap();

        // a second key claiming to be the issuer
        let impostor = IdentityManager::new(DOMAIN, ISSUER_PUBLISHER_ID)
            .generate()
            .unwrap();
        let issued = IdentityManager::new(DOMAIN, "device").issue(&impostor).unwrap();
        let topic = "test/device/$updateidentity";
        let sealed = SecureEnvelope::new(ISSUER_PUBLISHER_ID, impostor.keys())
            .publish(topic, &issued, Some(&device.public_key()))
            .unwrap();
        let before = device.identity();
        bus.publish(topic, &sealed).unwrap();

        assert_eq!(device.identity(), before);
        assert_eq!(device.stats().discarded, 1);
        device.stop().await;
    }
}

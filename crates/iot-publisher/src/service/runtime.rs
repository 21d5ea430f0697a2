use crate::adapters::file_store::{FileIdentityStore, FileNodeStore};
use crate::config::{ConfigError, PublisherConfig};
use crate::domain::errors::PublisherError;
use crate::domain::identity::{IdentityManager, IdentityStatus, LocalIdentity};
use crate::domain::peers::PeerDirectory;
use crate::domain::registry::NodeRegistry;
use crate::ports::inbound::{
    DiscoveryHandler, NodeConfigHandler, NodeInputHandler, PollHandler, PublisherHooks,
};
use crate::ports::outbound::{IdentityStore, NodeStore};
use parking_lot::Mutex;
use shared_bus::{SubscriptionId, Transport};
use shared_crypto::PublicKey;
use shared_types::{
    now_timestamp, Address, AddressError, ConfigAttr, Input, MessageKind, Node, NodeAttrMap,
    Output, OutputValue, PublicIdentity,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Lifecycle state of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Counters since the runtime was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Completed heartbeat ticks.
    pub ticks: u64,
    /// Ticks on which the poll interval elapsed.
    pub polls: u64,
    /// Ticks on which the discovery interval elapsed.
    pub discoveries: u64,
    /// Frames handed to the transport.
    pub published: u64,
    /// Inbound messages dropped.
    pub discarded: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) ticks: AtomicU64,
    pub(crate) polls: AtomicU64,
    pub(crate) discoveries: AtomicU64,
    pub(crate) published: AtomicU64,
    pub(crate) discarded: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Mutable runtime state, guarded by one lock.
pub(crate) struct RuntimeState {
    pub(crate) status: RuntimeStatus,
    pub(crate) identity: Arc<LocalIdentity>,
    pub(crate) registry: NodeRegistry,
    pub(crate) hooks: PublisherHooks,
    pub(crate) discovery_interval: u32,
    pub(crate) poll_interval: u32,
    pub(crate) discovery_countdown: u32,
    pub(crate) poll_countdown: u32,
    /// Resolves when the heartbeat loop has exited.
    pub(crate) loop_stopped: Option<oneshot::Receiver<()>>,
    /// Set by `stop()` while starting; `start()` shuts down instead of running.
    pub(crate) stop_requested: bool,
    /// Callers of `stop()` waiting for another call to finish the shutdown.
    pub(crate) stop_waiters: Vec<oneshot::Sender<()>>,
    pub(crate) subscriptions: Vec<SubscriptionId>,
}

pub(crate) struct RuntimeInner {
    pub(crate) config: PublisherConfig,
    pub(crate) identity_manager: IdentityManager,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) identity_store: Option<Arc<dyn IdentityStore>>,
    pub(crate) node_store: Option<Arc<dyn NodeStore>>,
    pub(crate) peers: PeerDirectory,
    pub(crate) state: Mutex<RuntimeState>,
    pub(crate) counters: Counters,
}

/// Publisher runtime.
///
/// A cheap-to-clone handle; clones share one runtime. Independent runtimes
/// may share a transport.
///
/// # Example
///
/// ```rust,ignore
/// let bus = Arc::new(InMemoryBus::new());
/// let runtime = PublisherRuntime::new(config, bus, PublisherHooks::default())?;
/// let node = runtime.create_node("node1", "switch")?;
/// runtime.create_input("node1", "switch", DEFAULT_INSTANCE)?;
/// runtime.start().await?;
/// ```
#[derive(Clone)]
pub struct PublisherRuntime {
    pub(crate) inner: Arc<RuntimeInner>,
}

impl PublisherRuntime {
    /// Create a runtime using file stores for the folders in `config`.
    pub fn new(
        config: PublisherConfig,
        transport: Arc<dyn Transport>,
        hooks: PublisherHooks,
    ) -> Result<Self, PublisherError> {
        let identity_store = config
            .identity_folder
            .as_ref()
            .map(|folder| Arc::new(FileIdentityStore::new(folder)) as Arc<dyn IdentityStore>);
        let node_store = config
            .nodes_folder
            .as_ref()
            .map(|folder| Arc::new(FileNodeStore::new(folder)) as Arc<dyn NodeStore>);
        Self::with_stores(config, transport, identity_store, node_store, hooks)
    }

    /// Create a runtime with explicit stores.
    ///
    /// Loads or generates the identity. The peer directory starts empty.
    ///
    /// # Errors
    ///
    /// Invalid configuration, key generation failure, or failure to persist
    /// a newly generated identity.
    pub fn with_stores(
        config: PublisherConfig,
        transport: Arc<dyn Transport>,
        identity_store: Option<Arc<dyn IdentityStore>>,
        node_store: Option<Arc<dyn NodeStore>>,
        hooks: PublisherHooks,
    ) -> Result<Self, PublisherError> {
        config.validate()?;

        let identity_manager = IdentityManager::new(&config.domain, &config.publisher_id)
            .with_profile(&config.organization, &config.location)
            .with_validity(config.identity_validity);
        let identity = identity_manager.setup(identity_store.as_deref())?;

        let mut registry = NodeRegistry::new();
        registry.mark_identity_pending();

        info!(
            domain = %config.domain,
            publisher = %config.publisher_id,
            identity = %identity.status(),
            "Publisher runtime created"
        );

        let state = RuntimeState {
            status: RuntimeStatus::Stopped,
            identity: Arc::new(identity),
            registry,
            hooks,
            discovery_interval: config.discovery_interval,
            poll_interval: config.poll_interval,
            discovery_countdown: 1,
            poll_countdown: 1,
            loop_stopped: None,
            stop_requested: false,
            stop_waiters: Vec::new(),
            subscriptions: Vec::new(),
        };

        Ok(Self {
            inner: Arc::new(RuntimeInner {
                config,
                identity_manager,
                transport,
                identity_store,
                node_store,
                peers: PeerDirectory::new(),
                state: Mutex::new(state),
                counters: Counters::default(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &PublisherConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.inner.config.domain
    }

    #[must_use]
    pub fn publisher_id(&self) -> &str {
        &self.inner.config.publisher_id
    }

    #[must_use]
    pub fn status(&self) -> RuntimeStatus {
        self.inner.state.lock().status
    }

    /// The current identity document.
    #[must_use]
    pub fn identity(&self) -> PublicIdentity {
        self.inner.state.lock().identity.document().clone()
    }

    #[must_use]
    pub fn identity_status(&self) -> IdentityStatus {
        self.local_identity().status()
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.local_identity().public_key()
    }

    pub(crate) fn local_identity(&self) -> Arc<LocalIdentity> {
        self.inner.state.lock().identity.clone()
    }

    /// Peers learned from authenticated identity broadcasts. This
    /// publisher's own identity is never recorded here.
    #[must_use]
    pub fn peers(&self) -> &PeerDirectory {
        &self.inner.peers
    }

    /// Key for messages sent by `publisher_id`: the local key for this
    /// publisher, otherwise the peer directory entry.
    pub(crate) fn sender_key(&self, publisher_id: &str) -> Option<PublicKey> {
        if publisher_id == self.publisher_id() {
            Some(self.public_key())
        } else {
            self.inner.peers.get_public_key(publisher_id)
        }
    }

    #[must_use]
    pub fn stats(&self) -> RuntimeStats {
        let counters = &self.inner.counters;
        RuntimeStats {
            ticks: counters.ticks.load(Ordering::Relaxed),
            polls: counters.polls.load(Ordering::Relaxed),
            discoveries: counters.discoveries.load(Ordering::Relaxed),
            published: counters.published.load(Ordering::Relaxed),
            discarded: counters.discarded.load(Ordering::Relaxed),
        }
    }

    pub fn on_node_config(&self, handler: NodeConfigHandler) {
        self.inner.state.lock().hooks.on_node_config = Some(handler);
    }

    pub fn on_node_input(&self, handler: NodeInputHandler) {
        self.inner.state.lock().hooks.on_node_input = Some(handler);
    }

    pub fn on_discovery(&self, handler: DiscoveryHandler) {
        self.inner.state.lock().hooks.on_discovery = Some(handler);
    }

    pub fn on_poll(&self, handler: PollHandler) {
        self.inner.state.lock().hooks.on_poll = Some(handler);
    }

    /// Ticks between discovery republication. Takes effect no later than
    /// `ticks` ticks from now.
    pub fn set_discovery_interval(&self, ticks: u32) -> Result<(), PublisherError> {
        if ticks == 0 {
            return Err(ConfigError::ZeroInterval("discovery_interval").into());
        }
        let mut state = self.inner.state.lock();
        state.discovery_interval = ticks;
        state.discovery_countdown = state.discovery_countdown.min(ticks);
        Ok(())
    }

    /// Ticks between poll hook invocations. Takes effect no later than
    /// `ticks` ticks from now.
    pub fn set_poll_interval(&self, ticks: u32) -> Result<(), PublisherError> {
        if ticks == 0 {
            return Err(ConfigError::ZeroInterval("poll_interval").into());
        }
        let mut state = self.inner.state.lock();
        state.poll_interval = ticks;
        state.poll_countdown = state.poll_countdown.min(ticks);
        Ok(())
    }

    // =========================================================================
    // Nodes, inputs and outputs
    // =========================================================================

    /// Register a node owned by this publisher.
    ///
    /// Configured values saved by an earlier run are restored onto it at
    /// start.
    pub fn create_node(&self, node_id: &str, node_type: &str) -> Result<Node, PublisherError> {
        let node = Node::new(self.domain(), self.publisher_id(), node_id, node_type)?;
        self.inner.state.lock().registry.add_node(node.clone());
        Ok(node)
    }

    /// Set a free-form attribute of a node.
    pub fn set_node_attr(&self, node_id: &str, name: &str, value: &str) -> Result<(), PublisherError> {
        let found = self.inner.state.lock().registry.set_node_attr(node_id, name, value);
        if !found {
            return Err(PublisherError::UnknownNode(node_id.to_string()));
        }
        Ok(())
    }

    /// Declare a configurable attribute of a node.
    pub fn declare_node_config(
        &self,
        node_id: &str,
        name: &str,
        attr: ConfigAttr,
    ) -> Result<(), PublisherError> {
        let found = self
            .inner
            .state
            .lock()
            .registry
            .declare_config(node_id, name, attr);
        if !found {
            return Err(PublisherError::UnknownNode(node_id.to_string()));
        }
        Ok(())
    }

    /// Apply configuration values locally. Returns whether anything changed.
    pub fn update_node_config(
        &self,
        node_id: &str,
        values: &NodeAttrMap,
    ) -> Result<bool, PublisherError> {
        let changed = self
            .inner
            .state
            .lock()
            .registry
            .update_node_config(node_id, values)
            .ok_or_else(|| PublisherError::UnknownNode(node_id.to_string()))?;
        if changed {
            self.save_nodes();
        }
        Ok(changed)
    }

    /// Register an input on an existing node.
    pub fn create_input(
        &self,
        node_id: &str,
        input_type: &str,
        instance: &str,
    ) -> Result<Input, PublisherError> {
        let input = Input::new(self.domain(), self.publisher_id(), node_id, input_type, instance)?;
        let mut state = self.inner.state.lock();
        if state.registry.node(node_id).is_none() {
            return Err(PublisherError::UnknownNode(node_id.to_string()));
        }
        state.registry.add_input(input.clone());
        Ok(input)
    }

    /// Register an output on an existing node.
    pub fn create_output(
        &self,
        node_id: &str,
        output_type: &str,
        instance: &str,
    ) -> Result<Output, PublisherError> {
        let output = Output::new(self.domain(), self.publisher_id(), node_id, output_type, instance)?;
        let mut state = self.inner.state.lock();
        if state.registry.node(node_id).is_none() {
            return Err(PublisherError::UnknownNode(node_id.to_string()));
        }
        state.registry.add_output(output.clone());
        Ok(output)
    }

    /// Record a new output value; it is published on the next tick.
    pub fn update_output_value(
        &self,
        node_id: &str,
        output_type: &str,
        instance: &str,
        value: &str,
    ) -> Result<OutputValue, PublisherError> {
        let discovery = Address::io(
            self.domain(),
            self.publisher_id(),
            node_id,
            output_type,
            instance,
            MessageKind::OutputDiscovery,
        )?;
        let output_value = OutputValue {
            address: raw_address(&discovery)?,
            value: value.to_string(),
            timestamp: now_timestamp(),
        };

        let discovery = discovery.to_string();
        let known = self
            .inner
            .state
            .lock()
            .registry
            .set_output_value(&discovery, output_value.clone());
        if !known {
            return Err(PublisherError::UnknownNode(discovery));
        }
        Ok(output_value)
    }

    #[must_use]
    pub fn get_node(&self, node_id: &str) -> Option<Node> {
        self.inner.state.lock().registry.node(node_id).cloned()
    }

    #[must_use]
    pub fn get_nodes(&self) -> Vec<Node> {
        self.inner.state.lock().registry.nodes()
    }

    /// Input by discovery address.
    #[must_use]
    pub fn get_input(&self, address: &str) -> Option<Input> {
        self.inner.state.lock().registry.input(address).cloned()
    }

    #[must_use]
    pub fn get_inputs(&self) -> Vec<Input> {
        self.inner.state.lock().registry.inputs()
    }

    /// Output by discovery address.
    #[must_use]
    pub fn get_output(&self, address: &str) -> Option<Output> {
        self.inner.state.lock().registry.output(address).cloned()
    }

    #[must_use]
    pub fn get_outputs(&self) -> Vec<Output> {
        self.inner.state.lock().registry.outputs()
    }

    /// Latest value of the output with this discovery address.
    #[must_use]
    pub fn get_output_value(&self, address: &str) -> Option<OutputValue> {
        self.inner.state.lock().registry.output_value(address).cloned()
    }

    /// Write the node snapshot, if a node store is configured. Failures are
    /// logged; the in-memory state stays authoritative.
    pub(crate) fn save_nodes(&self) {
        let Some(store) = &self.inner.node_store else {
            return;
        };
        let nodes = self.get_nodes();
        if let Err(error) = store.save_nodes(self.publisher_id(), &nodes) {
            warn!(publisher = %self.publisher_id(), error = %error, "Failed to save nodes");
        }
    }
}

fn raw_address(discovery: &Address) -> Result<String, AddressError> {
    Ok(discovery.with_kind(MessageKind::Raw)?.to_string())
}

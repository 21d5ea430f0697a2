//! # Publisher Node
//!
//! Runs one IoT publisher on an in-memory bus.
//!
//! ## Startup Sequence
//!
//! 1. Install the log subscriber (`IOT_LOG_LEVEL`, default `info`)
//! 2. Load configuration from `IOT_*` environment variables
//! 3. Load or generate the publisher identity
//! 4. Register the demo switch node and its hooks
//! 5. Start the heartbeat and wait for Ctrl+C
//!
//! ## Environment
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `IOT_DOMAIN` | domain segment of every address |
//! | `IOT_PUBLISHER_ID` | publisher segment of every address |
//! | `IOT_IDENTITY_DIR` | folder for the identity file |
//! | `IOT_NODES_DIR` | folder for the node snapshot |
//! | `IOT_HEARTBEAT_MS` | heartbeat period in milliseconds |
//! | `IOT_DISCOVERY_INTERVAL` | ticks between discovery republication |
//! | `IOT_POLL_INTERVAL` | ticks between polls |
//! | `IOT_REQUIRE_ENCRYPTION` | `true` to drop plaintext commands |

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use iot_publisher::{PublisherConfig, PublisherHooks, PublisherRuntime, VerifiedMessage};
use shared_bus::InMemoryBus;
use shared_types::{ConfigAttr, Input, SetInputMessage, DEFAULT_INSTANCE};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const DEMO_NODE: &str = "switch1";
const DEMO_TYPE: &str = "switch";

/// Build the configuration from defaults overridden by `lookup`.
fn load_config_from(lookup: impl Fn(&str) -> Option<String>) -> PublisherConfig {
    let mut config = PublisherConfig::default();

    if let Some(domain) = lookup("IOT_DOMAIN") {
        config.domain = domain;
    }
    if let Some(publisher_id) = lookup("IOT_PUBLISHER_ID") {
        config.publisher_id = publisher_id;
    }
    if let Some(folder) = lookup("IOT_IDENTITY_DIR") {
        config.identity_folder = Some(folder.into());
    }
    if let Some(folder) = lookup("IOT_NODES_DIR") {
        config.nodes_folder = Some(folder.into());
    }
    if let Some(ms) = parsed::<u64>(&lookup, "IOT_HEARTBEAT_MS") {
        config.heartbeat_period = Duration::from_millis(ms);
    }
    if let Some(ticks) = parsed(&lookup, "IOT_DISCOVERY_INTERVAL") {
        config.discovery_interval = ticks;
    }
    if let Some(ticks) = parsed(&lookup, "IOT_POLL_INTERVAL") {
        config.poll_interval = ticks;
    }
    if let Some(require) = parsed(&lookup, "IOT_REQUIRE_ENCRYPTION") {
        config.require_encrypted_commands = require;
    }

    config
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

fn load_config() -> PublisherConfig {
    load_config_from(|name| std::env::var(name).ok())
}

fn log_level() -> Level {
    std::env::var("IOT_LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(Level::INFO)
}

/// Hooks for the demo switch: set requests are echoed to the output.
fn demo_hooks() -> PublisherHooks {
    PublisherHooks {
        on_node_input: Some(Arc::new(
            |runtime: &PublisherRuntime, input: &Input, message: &VerifiedMessage<SetInputMessage>| {
                info!(
                    input = %input.address,
                    sender = %message.sender,
                    value = %message.payload.value,
                    "Switch set"
                );
                if let Err(error) = runtime.update_output_value(
                    &input.node_id,
                    &input.input_type,
                    &input.instance,
                    &message.payload.value,
                ) {
                    warn!(error = %error, "Failed to update switch output");
                }
            },
        )),
        on_discovery: Some(Arc::new(|runtime: &PublisherRuntime| {
            info!(peers = runtime.peers().len(), "Discovery republished");
        })),
        ..PublisherHooks::default()
    }
}

fn register_demo_node(runtime: &PublisherRuntime) -> Result<()> {
    runtime.create_node(DEMO_NODE, DEMO_TYPE)?;
    runtime.declare_node_config(DEMO_NODE, "name", ConfigAttr::with_default("switch", "Display name"))?;
    runtime.create_input(DEMO_NODE, DEMO_TYPE, DEFAULT_INSTANCE)?;
    runtime.create_output(DEMO_NODE, DEMO_TYPE, DEFAULT_INSTANCE)?;
    runtime.update_output_value(DEMO_NODE, DEMO_TYPE, DEFAULT_INSTANCE, "off")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level())
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config();
    info!(
        domain = %config.domain,
        publisher = %config.publisher_id,
        heartbeat_ms = config.heartbeat_period.as_millis() as u64,
        "Loaded configuration"
    );

    let bus = Arc::new(InMemoryBus::new());
    let runtime = PublisherRuntime::new(config, bus, demo_hooks())
        .context("failed to create publisher runtime")?;
    register_demo_node(&runtime)?;
    runtime.start().await.context("failed to start publisher runtime")?;

    info!(
        identity = %runtime.identity_status(),
        "Publisher is running. Press Ctrl+C to stop."
    );
    tokio::signal::ctrl_c().await?;

    runtime.stop().await;
    let stats = runtime.stats();
    info!(ticks = stats.ticks, published = stats.published, "Shutdown complete");
    Ok(())
}

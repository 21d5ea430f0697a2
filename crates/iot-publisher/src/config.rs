//! Publisher configuration.

use shared_types::address::{SEGMENT_SEPARATOR, WILDCARD};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Domain used when none is configured.
pub const DEFAULT_DOMAIN: &str = "local";

/// Publisher id used when none is configured.
pub const DEFAULT_PUBLISHER_ID: &str = "publisher";

/// One day of one second ticks.
pub const DEFAULT_INTERVAL_TICKS: u32 = 86_400;

/// Default identity validity, one year.
pub const DEFAULT_IDENTITY_VALIDITY: Duration = Duration::from_secs(365 * 24 * 3600);

/// Configuration of one publisher runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Top level namespace shared by cooperating publishers.
    pub domain: String,
    /// Unique id of this publisher within the domain.
    pub publisher_id: String,
    /// Organization recorded in the identity document.
    pub organization: String,
    /// Location recorded in the identity document.
    pub location: String,
    /// Folder holding `<publisherID>-identity.json`. `None` keeps the
    /// identity in memory only.
    pub identity_folder: Option<PathBuf>,
    /// Folder holding `<publisherID>-nodes.json`. `None` disables node
    /// persistence.
    pub nodes_folder: Option<PathBuf>,
    /// Period of the heartbeat loop.
    pub heartbeat_period: Duration,
    /// Ticks between full discovery republication.
    pub discovery_interval: u32,
    /// Ticks between poll hook invocations.
    pub poll_interval: u32,
    /// Drop configure and set commands that were not encrypted.
    pub require_encrypted_commands: bool,
    /// Lifetime of a newly generated identity.
    pub identity_validity: Duration,
}

impl PublisherConfig {
    /// Defaults for the given domain and publisher.
    #[must_use]
    pub fn new(domain: &str, publisher_id: &str) -> Self {
        Self {
            domain: domain.to_string(),
            publisher_id: publisher_id.to_string(),
            ..Self::default()
        }
    }

    /// Fast heartbeat for tests.
    #[must_use]
    pub fn for_testing(domain: &str, publisher_id: &str) -> Self {
        Self {
            heartbeat_period: Duration::from_millis(20),
            ..Self::new(domain, publisher_id)
        }
    }

    /// Check the configuration before a runtime is built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_id("domain", &self.domain)?;
        validate_id("publisher_id", &self.publisher_id)?;
        if self.heartbeat_period.is_zero() {
            return Err(ConfigError::ZeroHeartbeat);
        }
        if self.discovery_interval == 0 {
            return Err(ConfigError::ZeroInterval("discovery_interval"));
        }
        if self.poll_interval == 0 {
            return Err(ConfigError::ZeroInterval("poll_interval"));
        }
        Ok(())
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            publisher_id: DEFAULT_PUBLISHER_ID.to_string(),
            organization: String::new(),
            location: String::new(),
            identity_folder: None,
            nodes_folder: None,
            heartbeat_period: Duration::from_secs(1),
            discovery_interval: DEFAULT_INTERVAL_TICKS,
            poll_interval: DEFAULT_INTERVAL_TICKS,
            require_encrypted_commands: false,
            identity_validity: DEFAULT_IDENTITY_VALIDITY,
        }
    }
}

fn validate_id(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Empty(field));
    }
    if value.contains(SEGMENT_SEPARATOR) || value.contains(WILDCARD) || value.contains('#') {
        return Err(ConfigError::InvalidId {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} {value:?} must not contain '/', '+' or '#'")]
    InvalidId { field: &'static str, value: String },

    #[error("heartbeat period must be greater than zero")]
    ZeroHeartbeat,

    #[error("{0} must be at least one tick")]
    ZeroInterval(&'static str),
}

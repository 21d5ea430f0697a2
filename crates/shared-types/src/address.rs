//! # Address Codec
//!
//! Hierarchical topic addresses used both for routing on the bus and for
//! deriving message semantics.
//!
//! ## Shapes
//!
//! ```text
//! domain/publisherID/messageType                          publisher level
//! domain/publisherID/nodeID/messageType                   node level
//! domain/publisherID/nodeID/class/instance/messageType    input/output level
//! ```
//!
//! The trailing segment is taken from a small reserved vocabulary
//! ([`MessageKind`]) and is the only thing classification looks at.

use crate::errors::AddressError;
use std::fmt;
use std::str::FromStr;

/// Separator between address segments.
pub const SEGMENT_SEPARATOR: char = '/';

/// Single-level wildcard understood by the bus.
pub const WILDCARD: &str = "+";

/// Fewest segments any recognized address shape has.
pub const MIN_SEGMENTS: usize = 3;

/// Segment count of node level addresses.
pub const NODE_SEGMENTS: usize = 4;

/// Segment count of input/output level addresses.
pub const IO_SEGMENTS: usize = 6;

/// Reserved message types carried in the trailing address segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Publisher identity broadcast.
    Identity,
    /// Issuer replacement of one publisher's identity.
    IdentityUpdate,
    /// Node discovery.
    NodeDiscovery,
    /// Command to configure a node.
    Configure,
    /// Input discovery.
    InputDiscovery,
    /// Output discovery.
    OutputDiscovery,
    /// Command to set an input.
    Set,
    /// Output value publication.
    Raw,
}

impl MessageKind {
    /// Every reserved kind.
    pub const ALL: [MessageKind; 8] = [
        MessageKind::Identity,
        MessageKind::IdentityUpdate,
        MessageKind::NodeDiscovery,
        MessageKind::Configure,
        MessageKind::InputDiscovery,
        MessageKind::OutputDiscovery,
        MessageKind::Set,
        MessageKind::Raw,
    ];

    /// The reserved segment token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            MessageKind::Identity => "$identity",
            MessageKind::IdentityUpdate => "$updateidentity",
            MessageKind::NodeDiscovery => "$node",
            MessageKind::Configure => "$configure",
            MessageKind::InputDiscovery => "$input",
            MessageKind::OutputDiscovery => "$output",
            MessageKind::Set => "$set",
            MessageKind::Raw => "$raw",
        }
    }

    /// Look up a kind by its reserved token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.token() == token)
    }

    /// Minimum number of segments an address of this kind carries.
    #[must_use]
    pub const fn min_segments(self) -> usize {
        match self {
            MessageKind::Identity | MessageKind::IdentityUpdate => MIN_SEGMENTS,
            MessageKind::NodeDiscovery | MessageKind::Configure => NODE_SEGMENTS,
            MessageKind::InputDiscovery
            | MessageKind::OutputDiscovery
            | MessageKind::Set
            | MessageKind::Raw => IO_SEGMENTS,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A parsed, validated address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    segments: Vec<String>,
}

impl Address {
    /// Parse a raw topic string. No partial parse is attempted.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        Self::from_segments(raw.split(SEGMENT_SEPARATOR))
    }

    /// Build an address from segments, validating the segment count.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, AddressError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let address = Self {
            segments: segments.into_iter().map(Into::into).collect(),
        };
        address.validate()?;
        Ok(address)
    }

    /// Publisher level address, e.g. `domain/publisher/$identity`.
    pub fn publisher(
        domain: &str,
        publisher_id: &str,
        kind: MessageKind,
    ) -> Result<Self, AddressError> {
        Self::from_segments([domain, publisher_id, kind.token()])
    }

    /// Node level address, e.g. `domain/publisher/node/$configure`.
    pub fn node(
        domain: &str,
        publisher_id: &str,
        node_id: &str,
        kind: MessageKind,
    ) -> Result<Self, AddressError> {
        Self::from_segments([domain, publisher_id, node_id, kind.token()])
    }

    /// Input/output level address, e.g. `domain/publisher/node/switch/0/$set`.
    pub fn io(
        domain: &str,
        publisher_id: &str,
        node_id: &str,
        io_type: &str,
        instance: &str,
        kind: MessageKind,
    ) -> Result<Self, AddressError> {
        Self::from_segments([domain, publisher_id, node_id, io_type, instance, kind.token()])
    }

    /// Message kind derived from the trailing segment.
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        self.segments
            .last()
            .and_then(|token| MessageKind::from_token(token))
    }

    /// Copy of this address with one segment replaced.
    pub fn with_segment(&self, index: usize, value: &str) -> Result<Self, AddressError> {
        if index >= self.segments.len() {
            return Err(AddressError::SegmentOutOfRange {
                address: self.to_string(),
                index,
            });
        }
        let mut segments = self.segments.clone();
        segments[index] = value.to_string();
        Self::from_segments(segments)
    }

    /// Copy of this address with the trailing message type replaced.
    pub fn with_kind(&self, kind: MessageKind) -> Result<Self, AddressError> {
        self.with_segment(self.segments.len() - 1, kind.token())
    }

    /// All segments in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Domain segment.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.segments[0]
    }

    /// Publisher segment.
    #[must_use]
    pub fn publisher_id(&self) -> &str {
        &self.segments[1]
    }

    /// Node segment of node and input/output level addresses.
    #[must_use]
    pub fn node_id(&self) -> Option<&str> {
        (self.segments.len() >= NODE_SEGMENTS).then(|| self.segments[2].as_str())
    }

    /// Input/output type segment.
    #[must_use]
    pub fn io_type(&self) -> Option<&str> {
        (self.segments.len() >= IO_SEGMENTS).then(|| self.segments[3].as_str())
    }

    /// Input/output instance segment.
    #[must_use]
    pub fn instance(&self) -> Option<&str> {
        (self.segments.len() >= IO_SEGMENTS).then(|| self.segments[4].as_str())
    }

    fn validate(&self) -> Result<(), AddressError> {
        let required = self
            .kind()
            .map_or(MIN_SEGMENTS, MessageKind::min_segments)
            .max(MIN_SEGMENTS);
        if self.segments.len() < required {
            return Err(AddressError::Malformed {
                address: self.segments.join("/"),
                found: self.segments.len(),
                required,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The deterministic identity address of a publisher.
#[must_use]
pub fn identity_address(domain: &str, publisher_id: &str) -> String {
    format!(
        "{domain}{SEGMENT_SEPARATOR}{publisher_id}{SEGMENT_SEPARATOR}{}",
        MessageKind::Identity.token()
    )
}

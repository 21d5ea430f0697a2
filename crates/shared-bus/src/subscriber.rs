//! # Subscriptions
//!
//! Topic filters and the handler type invoked for matching messages.

use shared_types::address::{SEGMENT_SEPARATOR, WILDCARD};
use std::sync::Arc;

/// Multi-level wildcard, valid only as the last segment.
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Callback invoked with the topic a message arrived on and its bytes.
///
/// Handlers run on the publishing thread and must not block for long.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Handle returned by a subscription, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A parsed subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter {
    pattern: String,
    segments: Vec<String>,
}

impl TopicFilter {
    /// Parse a pattern. Returns `None` if `#` appears anywhere but last.
    #[must_use]
    pub fn parse(pattern: &str) -> Option<Self> {
        let segments: Vec<String> = pattern
            .split(SEGMENT_SEPARATOR)
            .map(str::to_string)
            .collect();
        let misplaced = segments
            .iter()
            .rev()
            .skip(1)
            .any(|segment| segment == MULTI_LEVEL_WILDCARD);
        if pattern.is_empty() || misplaced {
            return None;
        }
        Some(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// The original pattern text.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True if `topic` matches this filter.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        let mut topic_segments = topic.split(SEGMENT_SEPARATOR);
        for segment in &self.segments {
            if segment == MULTI_LEVEL_WILDCARD {
                return true;
            }
            match topic_segments.next() {
                Some(actual) if segment == WILDCARD || segment == actual => {}
                _ => return false,
            }
        }
        topic_segments.next().is_none()
    }
}

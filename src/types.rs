//! Common types used throughout the EWT service

use serde::{Deserialize, Serialize};

/// Opaque queue identifier: the final path segment of a queue locator.
///
/// An empty identifier is valid and is used as a store key like any other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(String);

impl QueueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identifier from an optional locator, empty when absent or malformed
    pub fn from_locator(locator: Option<&str>) -> Self {
        Self(crate::utils::queue_id_from_locator(locator))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QueueId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for QueueId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Contact channel, always compared in upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Channel {
    Voice,
    Chat,
    Task,
    Other(String),
}

impl Channel {
    /// Normalize an optional channel hint, defaulting to CHAT when missing or blank
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint.map(str::trim).filter(|h| !h.is_empty()) {
            Some(hint) => Self::from(hint.to_string()),
            None => Channel::Chat,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Channel::Voice => "VOICE",
            Channel::Chat => "CHAT",
            Channel::Task => "TASK",
            Channel::Other(name) => name,
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Channel::Chat
    }
}

impl From<String> for Channel {
    fn from(value: String) -> Self {
        let upper = value.trim().to_uppercase();
        match upper.as_str() {
            "VOICE" => Channel::Voice,
            "CHAT" => Channel::Chat,
            "TASK" => Channel::Task,
            "" => Channel::Chat,
            _ => Channel::Other(upper),
        }
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.as_str().to_string()
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time live metrics for a queue/channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSnapshot {
    pub contacts_in_queue: u64,
    pub oldest_contact_age_seconds: u64,
    pub agents_available: u64,
}

/// A computed estimate as persisted in the estimate store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EwtEstimate {
    pub queue_id: QueueId,
    pub wait_seconds: i64,
    pub observed_at_millis: i64,
}

impl EwtEstimate {
    pub fn new(queue_id: QueueId, wait_seconds: i64, observed_at_millis: i64) -> Self {
        Self {
            queue_id,
            wait_seconds,
            observed_at_millis,
        }
    }

    /// Age of the estimate relative to `now_millis` (negative for rows from the future)
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.observed_at_millis)
    }
}

/// Where the returned wait time came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateSource {
    /// A fresh row from the estimate store
    Cache,
    /// Live snapshot backlog formula
    Live,
    /// Historical average over the lookback window
    Historical,
    /// No usable signal; the default floor
    Default,
}

impl EstimateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateSource::Cache => "cache",
            EstimateSource::Live => "live",
            EstimateSource::Historical => "historical",
            EstimateSource::Default => "default",
        }
    }
}

impl std::fmt::Display for EstimateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub queue_id: QueueId,
    pub channel: Channel,
    pub wait_seconds: i64,
    pub minutes: i64,
    pub source: EstimateSource,
}

/// Flat inbound request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EwtRequest {
    #[serde(default)]
    pub queue_locator: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

/// Reply consumed by the routing decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EwtResponse {
    #[serde(rename = "QUEUE_ANSWER_TIME")]
    pub queue_answer_time: String,
}

impl EwtResponse {
    pub fn from_minutes(minutes: i64) -> Self {
        Self {
            queue_answer_time: minutes.to_string(),
        }
    }
}

//! Inbound request handling
//!
//! Extracts the queue locator and channel from an inbound event, runs the
//! resolver and formats the `QUEUE_ANSWER_TIME` reply. Events may be flat
//! (`{"queueLocator": ..., "channel": ...}`) or wrapped in a contact-flow
//! envelope (`{"Details": {"Parameters": ..., "ContactData": ...}}`).

use crate::error::{EwtError, Result};
use crate::metrics::MetricsCollector;
use crate::types::{EwtRequest, EwtResponse};
use crate::utils::current_millis;
use crate::wait_time::EwtResolver;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

const LOCATOR_KEYS: [&str; 3] = ["queueLocator", "QueueArn", "queueArn"];
const CHANNEL_KEYS: [&str; 2] = ["channel", "Channel"];

/// Entry point that turns inbound events into EWT replies
pub struct EntryHandler {
    resolver: Arc<EwtResolver>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl EntryHandler {
    pub fn new(resolver: Arc<EwtResolver>) -> Self {
        Self {
            resolver,
            metrics: None,
        }
    }

    /// Attach a Prometheus collector
    pub fn with_metrics(mut self, collector: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(collector);
        self
    }

    /// Extract locator and channel from a flat or enveloped event.
    ///
    /// Per field, a non-empty `Details.Parameters` value wins, then
    /// `Details.ContactData`, then the event root. Non-object events carry nothing.
    pub fn parse_request(event: &Value) -> EwtRequest {
        let details = event.get("Details");
        let parameters = details.and_then(|d| d.get("Parameters"));
        let contact_data = details.and_then(|d| d.get("ContactData"));

        let queue_locator = first_string(parameters, &LOCATOR_KEYS)
            .or_else(|| {
                contact_data
                    .and_then(|c| c.get("Queue"))
                    .and_then(|q| q.get("ARN"))
                    .and_then(non_empty_str)
            })
            .or_else(|| first_string(Some(event), &LOCATOR_KEYS));

        let channel = first_string(parameters, &CHANNEL_KEYS)
            .or_else(|| first_string(contact_data, &CHANNEL_KEYS))
            .or_else(|| first_string(Some(event), &CHANNEL_KEYS));

        EwtRequest {
            queue_locator,
            channel,
        }
    }

    /// Decode a raw request body into an event
    pub fn decode_event(body: &[u8]) -> Result<Value> {
        serde_json::from_slice(body).map_err(|e| {
            EwtError::InvalidRequest {
                reason: format!("body is not JSON: {}", e),
            }
            .into()
        })
    }

    /// Handle an event using the current clock
    pub async fn handle(&self, event: &Value) -> Result<EwtResponse> {
        self.handle_at(event, current_millis()).await
    }

    /// Handle an event as of `now_millis`
    pub async fn handle_at(&self, event: &Value, now_millis: i64) -> Result<EwtResponse> {
        let request_id = Uuid::new_v4();
        let request = Self::parse_request(event);

        debug!(
            "EWT request {} parsed - locator: {:?}, channel: {:?}",
            request_id, request.queue_locator, request.channel
        );

        let result = self
            .resolver
            .resolve(
                request.queue_locator.as_deref(),
                request.channel.as_deref(),
                now_millis,
            )
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.record_request(result.is_ok());
        }

        match result {
            Ok(resolution) => {
                info!(
                    "EWT request {} answered - queue: '{}', minutes: {}, source: {}",
                    request_id, resolution.queue_id, resolution.minutes, resolution.source
                );
                Ok(EwtResponse::from_minutes(resolution.minutes))
            }
            Err(e) => {
                error!("EWT request {} failed: {}", request_id, e);
                Err(e)
            }
        }
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_string(container: Option<&Value>, keys: &[&str]) -> Option<String> {
    let container = container?.as_object()?;
    keys.iter()
        .find_map(|key| container.get(*key).and_then(non_empty_str))
}

//! Fallback estimation policy
//!
//! Produces a single wait-time estimate in seconds, preferring the live queue
//! snapshot, falling back to the historical average and finally to the default
//! floor. Every estimate is clamped to the configured bounds.

use crate::error::{EwtError, Result};
use crate::telemetry::MetricsSource;
use crate::types::{Channel, EstimateSource, LiveSnapshot, QueueId};
use crate::wait_time::window::TimeWindow;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lower bound of any reported wait (1 minute)
pub const MIN_WAIT_SECONDS: i64 = 60;
/// Upper bound of any reported wait (20 minutes)
pub const MAX_WAIT_SECONDS: i64 = 1200;
/// Estimate used when no signal is available
pub const DEFAULT_WAIT_SECONDS: i64 = 60;
/// Serial handling time assumed per contact ahead of available agents
pub const AVERAGE_HANDLE_TIME_SECONDS: i64 = 180;
/// Longest accepted historical lookback (one leap year)
pub const MAX_LOOKBACK_HOURS: u64 = 24 * 366;

/// What to do when the fresh estimate cannot be persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Log the failure and still answer with the computed value
    #[default]
    BestEffort,
    /// Surface the failure to the caller
    Required,
}

impl FromStr for PersistencePolicy {
    type Err = EwtError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "best_effort" => Ok(PersistencePolicy::BestEffort),
            "required" => Ok(PersistencePolicy::Required),
            other => Err(EwtError::ConfigurationError {
                message: format!("Unknown persistence policy: {}", other),
            }),
        }
    }
}

/// Configuration for wait time estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    /// Minimum reported wait (safety bound)
    pub min_wait_seconds: i64,
    /// Maximum reported wait (safety bound)
    pub max_wait_seconds: i64,
    /// Wait assumed when no live backlog is detected
    pub default_wait_seconds: i64,
    /// Handling time per queued contact beyond agent capacity
    pub average_handle_time_seconds: i64,
    /// How long a stored estimate stays valid
    pub freshness_window_minutes: u64,
    /// Width of the historical query window
    pub historical_lookback_hours: u64,
    /// Per external call timeout, 0 disables it
    pub call_timeout_ms: u64,
    /// Whether a failed store write fails the resolution
    pub persistence_policy: PersistencePolicy,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            min_wait_seconds: MIN_WAIT_SECONDS,
            max_wait_seconds: MAX_WAIT_SECONDS,
            default_wait_seconds: DEFAULT_WAIT_SECONDS,
            average_handle_time_seconds: AVERAGE_HANDLE_TIME_SECONDS,
            freshness_window_minutes: 5,
            historical_lookback_hours: 1,
            call_timeout_ms: 0,
            persistence_policy: PersistencePolicy::BestEffort,
        }
    }
}

impl EstimationConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.min_wait_seconds >= self.max_wait_seconds {
            return Err(EwtError::ConfigurationError {
                message: "min_wait_seconds must be less than max_wait_seconds".to_string(),
            }
            .into());
        }

        if self.min_wait_seconds < 0 {
            return Err(EwtError::ConfigurationError {
                message: "min_wait_seconds must be non-negative".to_string(),
            }
            .into());
        }

        if self.default_wait_seconds < self.min_wait_seconds
            || self.default_wait_seconds > self.max_wait_seconds
        {
            return Err(EwtError::ConfigurationError {
                message: "default_wait_seconds must be within min/max bounds".to_string(),
            }
            .into());
        }

        if self.average_handle_time_seconds <= 0 {
            return Err(EwtError::ConfigurationError {
                message: "average_handle_time_seconds must be greater than 0".to_string(),
            }
            .into());
        }

        if self.freshness_window_minutes == 0 {
            return Err(EwtError::ConfigurationError {
                message: "freshness_window_minutes must be greater than 0".to_string(),
            }
            .into());
        }

        if self.historical_lookback_hours == 0 {
            return Err(EwtError::ConfigurationError {
                message: "historical_lookback_hours must be greater than 0".to_string(),
            }
            .into());
        }

        if self.historical_lookback_hours > MAX_LOOKBACK_HOURS {
            return Err(EwtError::ConfigurationError {
                message: format!(
                    "historical_lookback_hours must be at most {}",
                    MAX_LOOKBACK_HOURS
                ),
            }
            .into());
        }

        Ok(())
    }

    /// Get the freshness window as Duration
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_minutes.saturating_mul(60))
    }

    pub fn freshness_window_millis(&self) -> i64 {
        i64::try_from(self.freshness_window().as_millis()).unwrap_or(i64::MAX)
    }

    /// Get the historical lookback as a calendar duration, if representable
    pub fn lookback(&self) -> Option<chrono::Duration> {
        i64::try_from(self.historical_lookback_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
    }

    /// Timeout applied around each external call, if enabled
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_ms > 0).then(|| Duration::from_millis(self.call_timeout_ms))
    }
}

/// Bound a wait estimate to `[min_wait_seconds, max_wait_seconds]`
pub fn clamp_wait_seconds(seconds: i64, config: &EstimationConfig) -> i64 {
    seconds
        .min(config.max_wait_seconds)
        .max(config.min_wait_seconds)
}

/// Live estimate: age of the oldest contact plus serial handling of the backlog.
///
/// An empty queue yields the default wait.
pub fn live_estimate_seconds(snapshot: &LiveSnapshot, config: &EstimationConfig) -> i64 {
    if snapshot.contacts_in_queue == 0 {
        return config.default_wait_seconds;
    }

    let backlog = snapshot
        .contacts_in_queue
        .saturating_sub(snapshot.agents_available);
    let oldest = i64::try_from(snapshot.oldest_contact_age_seconds).unwrap_or(i64::MAX);
    let backlog = i64::try_from(backlog).unwrap_or(i64::MAX);

    oldest.saturating_add(backlog.saturating_mul(config.average_handle_time_seconds))
}

/// Run an external call, bounded by `timeout` when one is configured
pub async fn bounded_call<T, F>(operation: &str, timeout: Option<Duration>, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(EwtError::UpstreamTimeout {
                operation: operation.to_string(),
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }
            .into()),
        },
        None => call.await,
    }
}

/// A freshly computed, clamped estimate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshEstimate {
    /// Clamped seconds, safe to persist and report
    pub seconds: i64,
    /// Seconds before clamping
    pub raw_seconds: i64,
    pub source: EstimateSource,
    /// External operations that failed while computing the estimate
    pub failed_operations: Vec<&'static str>,
}

/// Tiered live → historical → default estimator
pub struct FallbackEstimator {
    config: EstimationConfig,
    metrics_source: Arc<dyn MetricsSource>,
}

impl FallbackEstimator {
    /// Create a new estimator over a metrics source
    pub fn new(config: EstimationConfig, metrics_source: Arc<dyn MetricsSource>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            metrics_source,
        })
    }

    pub fn config(&self) -> &EstimationConfig {
        &self.config
    }

    /// Compute a clamped estimate. Upstream failures degrade to the next tier.
    pub async fn estimate(
        &self,
        queue_id: &QueueId,
        channel: &Channel,
        now_millis: i64,
    ) -> FreshEstimate {
        let timeout = self.config.call_timeout();
        let mut failed_operations = Vec::new();

        let (mut seconds, mut source) = match bounded_call(
            "live_snapshot",
            timeout,
            self.metrics_source.live_snapshot(queue_id, channel),
        )
        .await
        {
            Ok(snapshot) if snapshot.contacts_in_queue > 0 => {
                let live = live_estimate_seconds(&snapshot, &self.config);
                debug!(
                    "Live estimate for '{}'/{}: {}s (contacts: {}, agents: {}, oldest: {}s)",
                    queue_id,
                    channel,
                    live,
                    snapshot.contacts_in_queue,
                    snapshot.agents_available,
                    snapshot.oldest_contact_age_seconds
                );
                (live, EstimateSource::Live)
            }
            Ok(_) => {
                debug!("No live backlog for '{}'/{}", queue_id, channel);
                (self.config.default_wait_seconds, EstimateSource::Default)
            }
            Err(e) => {
                warn!(
                    "Live snapshot unavailable for '{}'/{}, treating as no signal: {}",
                    queue_id, channel, e
                );
                failed_operations.push("live_snapshot");
                (self.config.default_wait_seconds, EstimateSource::Default)
            }
        };

        // At or below the floor the live value is not a meaningful measurement
        let window = if seconds <= self.config.default_wait_seconds {
            let window = self
                .config
                .lookback()
                .and_then(|lookback| TimeWindow::lookback_from_millis(now_millis, lookback));
            if window.is_none() {
                warn!(
                    "No historical window for '{}'/{} at {}ms, skipping historical average",
                    queue_id, channel, now_millis
                );
            }
            window
        } else {
            None
        };

        if let Some(window) = window {
            match bounded_call(
                "historical_average",
                timeout,
                self.metrics_source
                    .historical_average(queue_id, channel, window.start, window.end),
            )
            .await
            {
                Ok(Some(average)) if average.is_finite() && average > 0.0 => {
                    debug!(
                        "Historical average for '{}'/{} over {} - {}: {:.1}s",
                        queue_id, channel, window.start, window.end, average
                    );
                    seconds = average.round() as i64;
                    source = EstimateSource::Historical;
                }
                Ok(_) => {
                    debug!("No usable historical data for '{}'/{}", queue_id, channel);
                }
                Err(e) => {
                    warn!(
                        "Historical average unavailable for '{}'/{}, keeping live estimate: {}",
                        queue_id, channel, e
                    );
                    failed_operations.push("historical_average");
                }
            }
        }

        FreshEstimate {
            seconds: clamp_wait_seconds(seconds, &self.config),
            raw_seconds: seconds,
            source,
            failed_operations,
        }
    }
}

//! Utility functions for the EWT service

use crate::error::{EwtError, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Get the current time in milliseconds since the Unix epoch
pub fn current_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse the queue identifier out of a resource locator.
///
/// The identifier is the text after the last `/` of the trimmed locator.
pub fn parse_queue_locator(locator: &str) -> Result<String> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(EwtError::InvalidQueueLocator {
            reason: "locator is blank".to_string(),
        }
        .into());
    }

    match locator.rsplit_once('/') {
        Some((_, segment)) if !segment.is_empty() => Ok(segment.to_string()),
        Some(_) => Err(EwtError::InvalidQueueLocator {
            reason: format!("'{}' ends with a slash", locator),
        }
        .into()),
        None => Err(EwtError::InvalidQueueLocator {
            reason: format!("'{}' has no path segment", locator),
        }
        .into()),
    }
}

/// Extract the queue identifier from an optional locator.
///
/// Absent or malformed locators yield an empty string rather than an error.
pub fn queue_id_from_locator(locator: Option<&str>) -> String {
    let Some(locator) = locator else {
        debug!("No queue locator supplied, using empty queue id");
        return String::new();
    };

    parse_queue_locator(locator).unwrap_or_else(|e| {
        debug!("{}, using empty queue id", e);
        String::new()
    })
}

/// Convert seconds to whole minutes, rounding halves up.
///
/// Negative inputs (only possible from foreign store rows) round half away from zero.
pub fn seconds_to_minutes(seconds: i64) -> i64 {
    (seconds as f64 / 60.0).round() as i64
}

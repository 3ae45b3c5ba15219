//! Historical lookback window alignment
//!
//! The historical metrics backend only accepts query boundaries that sit on
//! 5-minute grid lines, so both ends of the window are truncated to the grid.

use chrono::{DateTime, Duration, DurationRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Width of one historical metrics bucket
pub const GRID_MINUTES: i64 = 5;

/// Half-open historical query range aligned to the 5-minute grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window ending at the last completed grid line before `now`.
    ///
    /// `None` when the start falls outside the representable calendar.
    pub fn lookback(now: DateTime<Utc>, lookback: Duration) -> Option<Self> {
        let start = now.checked_sub_signed(lookback)?;
        Some(Self {
            start: align_to_grid(start),
            end: align_to_grid(now),
        })
    }

    /// Same as [`TimeWindow::lookback`] for an epoch-millis clock reading
    pub fn lookback_from_millis(now_millis: i64, lookback: Duration) -> Option<Self> {
        let Some(now) = Utc.timestamp_millis_opt(now_millis).single() else {
            warn!("Clock reading {}ms is out of range, no lookback window", now_millis);
            return None;
        };
        Self::lookback(now, lookback)
    }

    pub fn width(&self) -> Duration {
        self.end - self.start
    }
}

/// Truncate minutes down to a multiple of five and zero everything below
pub fn align_to_grid(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(Duration::minutes(GRID_MINUTES))
        .unwrap_or(instant)
}

/// Whether an instant already sits on a grid line
pub fn is_grid_aligned(instant: DateTime<Utc>) -> bool {
    use chrono::Timelike;

    instant.minute() % GRID_MINUTES as u32 == 0
        && instant.second() == 0
        && instant.nanosecond() == 0
}

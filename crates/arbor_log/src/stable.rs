//! Stable-period detection.
//!
//! Finds the widest quiet gap between consecutive structural events. The
//! event just before that gap is a good default viewpoint.

use crate::timeline::Timeline;
use serde::{Deserialize, Serialize};

/// Widest gap between structural events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StablePeriod {
    /// Timeline index of the event right before the gap
    pub index: usize,
    /// Gap length in milliseconds
    pub gap_millis: i64,
}

/// Stable-period detector errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StableError {
    /// No structural event to anchor on
    #[error("Timeline has no structural events")]
    EmptyTimeline,
}

/// Locate the widest gap between consecutive structural events.
///
/// A timeline with a single structural event anchors on it with a zero gap.
/// Among equal gaps the earliest wins.
///
/// # Errors
///
/// Returns error if the timeline has no structural events
pub fn detect_stable_position(timeline: &Timeline) -> Result<StablePeriod, StableError> {
    let structural = timeline.structural();
    let first = structural.first().ok_or(StableError::EmptyTimeline)?;

    let mut best = StablePeriod {
        index: first.index.unwrap_or_default(),
        gap_millis: 0,
    };
    for pair in structural.windows(2) {
        let gap = pair[1].timestamp.millis_since(&pair[0].timestamp);
        if gap > best.gap_millis {
            best = StablePeriod {
                index: pair[0].index.unwrap_or_default(),
                gap_millis: gap,
            };
        }
    }

    tracing::info!(index = best.index, gap_ms = best.gap_millis, "Found stable period");
    Ok(best)
}

//! Topology replay engine.
//!
//! The engine holds one cursor over the timeline. Moving it forward applies
//! the events in between; moving it backward rebuilds the graph from the
//! start (or from the newest checkpoint) and replays forward again. There
//! is no per-event undo.

use crate::checkpoint::CheckpointStore;
use crate::graph::{InvariantViolation, TopologyGraph};
use crate::snapshot::Snapshot;
use arbor_log::Timeline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What happens to dead vertices once nothing points at them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeletionPolicy {
    /// Keep dead vertices for the whole session
    #[default]
    Retain,
    /// Remove a dead vertex as soon as it has no incoming edge
    PurgeIsolated,
}

/// Replay engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Dead-vertex handling
    pub deletion_policy: DeletionPolicy,
    /// Checkpoint every N applied events (0 = never)
    pub checkpoint_interval: usize,
}

/// Replay engine error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// An event broke a graph invariant
    #[error("Event {index} ({event}): {source}")]
    Invariant {
        /// Timeline index of the offending event
        index: usize,
        /// Display form of the event
        event: String,
        /// Violated invariant
        #[source]
        source: InvariantViolation,
    },

    /// A previous failure left the graph untrustworthy
    #[error("Replay engine failed at event {index} and must be discarded")]
    Poisoned {
        /// Index of the event that failed
        index: usize,
    },
}

/// Replay engine for one log corpus
pub struct ReplayEngine {
    timeline: Arc<Timeline>,
    config: ReplayConfig,
    graph: TopologyGraph,
    current: Option<usize>,
    checkpoints: CheckpointStore,
    failed_at: Option<usize>,
}

impl ReplayEngine {
    /// Create an engine with no events applied
    #[must_use]
    pub fn new(timeline: impl Into<Arc<Timeline>>) -> Self {
        Self::with_config(timeline, ReplayConfig::default())
    }

    /// Create with custom config
    #[must_use]
    pub fn with_config(timeline: impl Into<Arc<Timeline>>, config: ReplayConfig) -> Self {
        Self {
            timeline: timeline.into(),
            checkpoints: CheckpointStore::new(config.checkpoint_interval),
            config,
            graph: TopologyGraph::new(),
            current: None,
            failed_at: None,
        }
    }

    /// Events being replayed
    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Index of the last applied event, `None` before the first
    #[must_use]
    pub const fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Cursor as a signed position, -1 before the first event
    #[must_use]
    pub fn position(&self) -> i64 {
        self.current.map_or(-1, |index| index as i64)
    }

    /// Move the cursor to `target`, clamped to the timeline.
    ///
    /// # Errors
    ///
    /// Returns error if an applied event breaks an invariant, or if the
    /// engine already failed earlier
    pub fn seek(&mut self, target: i64) -> Result<(), ReplayError> {
        if let Some(index) = self.failed_at {
            return Err(ReplayError::Poisoned { index });
        }
        let Some(last) = self.timeline.len().checked_sub(1) else {
            return Ok(());
        };
        let target = target.clamp(0, last as i64) as usize;
        if self.current == Some(target) {
            return Ok(());
        }

        if self.current.is_some_and(|current| target < current) {
            self.rewind(target);
        }

        let start = self.current.map_or(0, |current| current + 1);
        tracing::debug!(
            from = self.position(),
            to = target,
            events = target + 1 - start,
            "Moving to event"
        );
        for index in start..=target {
            self.apply(index)?;
        }
        Ok(())
    }

    /// Move to the last event at most `offset_millis` after the first one
    ///
    /// # Errors
    ///
    /// Same as [`Self::seek`]
    pub fn seek_to_time(&mut self, offset_millis: i64) -> Result<(), ReplayError> {
        let target = self
            .timeline
            .index_at_offset(offset_millis)
            .map_or(-1, |index| index as i64);
        self.seek(target)
    }

    /// Move the cursor by `delta` events
    ///
    /// # Errors
    ///
    /// Same as [`Self::seek`]
    pub fn step(&mut self, delta: i64) -> Result<(), ReplayError> {
        self.seek(self.position().saturating_add(delta))
    }

    /// Drop all state and return to before the first event
    pub fn reset(&mut self) {
        tracing::trace!("Reset");
        self.graph.clear();
        self.current = None;
    }

    fn rewind(&mut self, target: usize) {
        match self.checkpoints.nearest(target) {
            Some((index, graph)) => {
                tracing::trace!(checkpoint = index, "Restoring checkpoint");
                self.graph = graph.clone();
                self.current = Some(index);
            }
            None => self.reset(),
        }
    }

    fn apply(&mut self, index: usize) -> Result<(), ReplayError> {
        let event = &self.timeline.events()[index];
        if let Err(source) = self.graph.apply(event, self.config.deletion_policy) {
            tracing::error!(index, event = %event, error = %source, "Replay invariant violated");
            self.failed_at = Some(index);
            return Err(ReplayError::Invariant {
                index,
                event: event.to_string(),
                source,
            });
        }
        self.current = Some(index);
        self.checkpoints.record(index, &self.graph);
        Ok(())
    }

    /// Read-only view of the current graph
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::new(self.current, &self.graph)
    }

    /// Attribute dump of the vertex currently bound to `node`
    #[must_use]
    pub fn describe(&self, node: &str) -> Option<String> {
        let snapshot = self.snapshot();
        snapshot.vertex_by_name(node).and_then(|v| snapshot.describe(v.id))
    }
}

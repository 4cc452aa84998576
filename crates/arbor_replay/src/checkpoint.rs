//! Periodic graph checkpoints for backward seeks.
//!
//! Without checkpoints a backward seek replays from the first event. With an
//! interval `N`, the graph is cloned after every N-th event and a backward
//! seek resumes from the newest clone at or before its target.

use crate::graph::TopologyGraph;
use std::collections::BTreeMap;

/// Graph clones keyed by the index of the last applied event
#[derive(Debug, Clone, Default)]
pub struct CheckpointStore {
    interval: usize,
    checkpoints: BTreeMap<usize, TopologyGraph>,
}

impl CheckpointStore {
    /// Create a store; an interval of zero disables checkpoints
    #[must_use]
    pub fn new(interval: usize) -> Self {
        Self {
            interval,
            checkpoints: BTreeMap::new(),
        }
    }

    /// Whether an interval is set
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.interval > 0
    }

    /// Record the graph after applying `index`, if it falls on the interval
    pub fn record(&mut self, index: usize, graph: &TopologyGraph) {
        if !self.is_enabled() || (index + 1) % self.interval != 0 {
            return;
        }
        self.checkpoints
            .entry(index)
            .or_insert_with(|| graph.clone());
    }

    /// Newest checkpoint at or before `target`
    #[must_use]
    pub fn nearest(&self, target: usize) -> Option<(usize, &TopologyGraph)> {
        self.checkpoints
            .range(..=target)
            .next_back()
            .map(|(index, graph)| (*index, graph))
    }

    /// Number of stored checkpoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Whether no checkpoint is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}

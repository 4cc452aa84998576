//! ARBOR Replay Engine
//!
//! Rebuilds the overlay topology at any point of a merged timeline and
//! exposes read-only snapshots of it.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod apply;
pub mod checkpoint;
pub mod engine;
pub mod graph;
pub mod snapshot;

pub use checkpoint::CheckpointStore;
pub use engine::{DeletionPolicy, ReplayConfig, ReplayEngine, ReplayError};
pub use graph::{Edge, EdgeKind, InvariantViolation, TopologyGraph, Vertex, VertexId};
pub use snapshot::{EdgeData, Snapshot, SnapshotData, VertexData};

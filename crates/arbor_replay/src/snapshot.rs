//! Read-only views of the replayed graph.

use crate::graph::{Edge, EdgeKind, TopologyGraph, Vertex, VertexId};
use arbor_log::{Location, ManagerState, TreeState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

/// Borrowed view of the graph at the engine's cursor
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    index: Option<usize>,
    graph: &'a TopologyGraph,
}

impl<'a> Snapshot<'a> {
    pub(crate) const fn new(index: Option<usize>, graph: &'a TopologyGraph) -> Self {
        Self { index, graph }
    }

    /// Index of the last applied event
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }

    /// Every vertex, dead ones included, in creation order
    pub fn vertices(&self) -> impl Iterator<Item = &'a Vertex> {
        self.graph.vertices()
    }

    /// Every edge
    pub fn edges(&self) -> impl Iterator<Item = &'a Edge> {
        self.graph.edges()
    }

    /// Number of vertices
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.graph.vertex_count()
    }

    /// Number of edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Vertex by id
    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&'a Vertex> {
        self.graph.vertex(id)
    }

    /// Vertex currently bound to a node name
    #[must_use]
    pub fn vertex_by_name(&self, node: &str) -> Option<&'a Vertex> {
        let graph = self.graph;
        graph.id_by_name(node).ok().and_then(|id| graph.vertex(id))
    }

    fn names(&self, ids: impl IntoIterator<Item = &'a VertexId>) -> Vec<String> {
        ids.into_iter().map(|id| self.graph.name_of(*id)).collect()
    }

    /// Multi-line attribute dump of one vertex
    #[must_use]
    pub fn describe(&self, id: VertexId) -> Option<String> {
        let v = self.graph.vertex(id)?;
        let mut out = String::new();

        let _ = write!(out, "{} ({})", v.node, v.address);
        if !v.alive {
            out.push_str(" [dead]");
        }
        out.push('\n');
        if let Some(Location { x, y }) = v.location {
            let _ = writeln!(out, "location: {x}, {y}");
        }
        let _ = writeln!(out, "manager: {}", v.manager_state.literal());
        let _ = writeln!(out, "tree: {}", v.tree_state.literal());
        let parent = v.parent.map_or_else(|| "-".to_string(), |p| self.graph.name_of(p));
        let _ = writeln!(out, "parent: {parent}");
        let _ = writeln!(out, "grandparents: [{}]", self.names(&v.grandparents).join(", "));
        let _ = writeln!(out, "parent metadata: [{}]", v.parent_metadata.join(":"));

        let _ = writeln!(out, "children: {}", v.children.len());
        for (child, metadata) in &v.children {
            let _ = writeln!(out, "  {} {}", self.graph.name_of(*child), metadata);
        }
        let _ = writeln!(out, "active: [{}]", self.names(&v.active).join(", "));
        let _ = write!(out, "passive: [{}]", self.names(&v.passive).join(", "));
        Some(out)
    }

    /// Owned, name-keyed copy for serialization and comparison
    #[must_use]
    pub fn to_data(&self) -> SnapshotData {
        let vertices = self
            .vertices()
            .map(|v| VertexData {
                node: v.node.clone(),
                address: v.address,
                location: v.location,
                alive: v.alive,
                manager_state: v.manager_state,
                tree_state: v.tree_state,
                parent: v.parent.map(|p| self.graph.name_of(p)),
                grandparents: self.names(&v.grandparents),
                parent_metadata: v.parent_metadata.clone(),
                children: v
                    .children
                    .iter()
                    .map(|(child, metadata)| (self.graph.name_of(*child), metadata.clone()))
                    .collect(),
                active: self.names(&v.active),
                passive: self.names(&v.passive),
            })
            .collect();
        let edges = self
            .edges()
            .map(|e| EdgeData {
                origin: self.graph.name_of(e.origin),
                destination: self.graph.name_of(e.destination),
                kind: e.kind,
            })
            .collect();

        SnapshotData {
            index: self.index,
            vertices,
            edges,
        }
    }
}

/// Serializable vertex with neighbours referenced by node name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexData {
    /// Node name
    pub node: String,
    /// Last announced address
    pub address: Ipv4Addr,
    /// Position from the Hello, if any
    pub location: Option<Location>,
    /// False after Goodbye
    pub alive: bool,
    /// Manager state
    pub manager_state: ManagerState,
    /// Tree state
    pub tree_state: TreeState,
    /// Parent name
    pub parent: Option<String>,
    /// Grandparent names, nearest first
    pub grandparents: Vec<String>,
    /// Metadata received from the parent
    pub parent_metadata: Vec<String>,
    /// Child name to last reported metadata
    pub children: BTreeMap<String, String>,
    /// Active view
    pub active: Vec<String>,
    /// Passive view
    pub passive: Vec<String>,
}

/// Serializable edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Origin name
    pub origin: String,
    /// Destination name
    pub destination: String,
    /// Relationship
    pub kind: EdgeKind,
}

/// Owned snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Index of the last applied event
    pub index: Option<usize>,
    /// Vertices in creation order
    pub vertices: Vec<VertexData>,
    /// Edges ordered by origin, destination, kind
    pub edges: Vec<EdgeData>,
}

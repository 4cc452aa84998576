//! Topology graph reconstructed during replay.
//!
//! A directed multigraph: two vertices may be joined by several edges as
//! long as their kinds differ. Vertices are looked up by node name and by
//! address; both indices only ever point at the live vertex for a key.

use arbor_log::{Location, ManagerState, TreeState};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::net::Ipv4Addr;

/// Stable identity of a vertex, assigned in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub usize);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Edge type
///
/// Parent and child kinds each form a progression; view kinds are toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Child towards the parent it is connecting to
    ConnectingParent,
    /// Child towards a connected parent
    ConnectedParent,
    /// Child towards the parent it is syncing from
    SyncParent,
    /// Child towards a parent it is fully attached to
    ReadyParent,
    /// Parent towards a newly connected child
    ConnectedChild,
    /// Parent towards a syncing child
    SyncChild,
    /// Parent towards a ready child
    ReadyChild,
    /// Active-view membership
    ActiveView,
    /// Passive-view membership
    PassiveView,
}

impl EdgeKind {
    /// Parent edge implied by a tree state
    #[must_use]
    pub const fn for_tree_state(state: TreeState) -> Option<Self> {
        match state {
            TreeState::ParentConnecting => Some(Self::ConnectingParent),
            TreeState::ParentConnected => Some(Self::ConnectedParent),
            TreeState::ParentSync => Some(Self::SyncParent),
            TreeState::ParentReady => Some(Self::ReadyParent),
            TreeState::Inactive | TreeState::Datacenter => None,
        }
    }

    /// Kind replaced when this kind is installed
    #[must_use]
    pub const fn predecessor(self) -> Option<Self> {
        match self {
            Self::ConnectedParent => Some(Self::ConnectingParent),
            Self::SyncParent => Some(Self::ConnectedParent),
            Self::ReadyParent => Some(Self::SyncParent),
            Self::SyncChild => Some(Self::ConnectedChild),
            Self::ReadyChild => Some(Self::SyncChild),
            Self::ConnectingParent | Self::ConnectedChild | Self::ActiveView | Self::PassiveView => {
                None
            }
        }
    }

}

/// Directed, typed relation between two vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    /// Vertex that logged the relation
    pub origin: VertexId,
    /// Vertex it points at
    pub destination: VertexId,
    /// Relation type
    pub kind: EdgeKind,
}

impl Edge {
    /// Create an edge
    #[must_use]
    pub const fn new(origin: VertexId, destination: VertexId, kind: EdgeKind) -> Self {
        Self {
            origin,
            destination,
            kind,
        }
    }
}

/// One network node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Stable identity
    pub id: VertexId,
    /// Logical node name
    pub node: String,
    /// Address announced in the last Hello
    pub address: Ipv4Addr,
    /// Placement announced in the last Hello
    pub location: Option<Location>,
    /// False once the node said Goodbye
    pub alive: bool,
    /// Membership manager state
    pub manager_state: ManagerState,
    /// Position in the parent progression
    pub tree_state: TreeState,
    /// Current or pending parent
    pub parent: Option<VertexId>,
    /// Ancestors above the parent, nearest first
    pub grandparents: Vec<VertexId>,
    /// One entry per ancestor level
    pub parent_metadata: Vec<String>,
    /// Child vertex to the metadata last reported for it
    pub children: BTreeMap<VertexId, String>,
    /// Active-view peers
    pub active: BTreeSet<VertexId>,
    /// Passive-view peers
    pub passive: BTreeSet<VertexId>,
}

impl Vertex {
    fn new(id: VertexId, node: String, address: Ipv4Addr, location: Option<Location>) -> Self {
        Self {
            id,
            node,
            address,
            location,
            alive: true,
            manager_state: ManagerState::default(),
            tree_state: TreeState::default(),
            parent: None,
            grandparents: Vec::new(),
            parent_metadata: Vec::new(),
            children: BTreeMap::new(),
            active: BTreeSet::new(),
            passive: BTreeSet::new(),
        }
    }

    /// Start a new session: live again, nothing announced yet
    fn revive(&mut self, address: Ipv4Addr, location: Option<Location>) {
        let id = self.id;
        let node = std::mem::take(&mut self.node);
        *self = Self::new(id, node, address, location);
    }

    /// Node name after its first `-`, or the whole name
    #[must_use]
    pub fn short_label(&self) -> &str {
        self.node
            .split_once('-')
            .map_or(self.node.as_str(), |(_, rest)| rest)
    }
}

/// Broken replay invariant.
///
/// Either the log corpus is corrupt or truncated, or the transition
/// function is wrong. The reconstructed graph cannot be trusted after one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// No live vertex carries this node name
    #[error("Unknown node {node}")]
    UnknownNode {
        /// Node name
        node: String,
    },

    /// No live vertex carries this address
    #[error("Unknown address {address}")]
    UnknownAddress {
        /// Address
        address: Ipv4Addr,
    },

    /// Name or address already bound to a live vertex
    #[error("Node {node} ({address}) is already registered")]
    DuplicateVertex {
        /// Node name
        node: String,
        /// Address
        address: Ipv4Addr,
    },

    /// Edge expected to exist was not found
    #[error("Edge {origin} -> {destination} {kind:?} not found")]
    MissingEdge {
        /// Origin node name
        origin: String,
        /// Destination node name
        destination: String,
        /// Edge kind
        kind: EdgeKind,
    },

    /// Disconnect removed zero or two child edges
    #[error("Disconnect of {child} from {parent} removed {removed} edges")]
    AmbiguousDisconnect {
        /// Parent node name
        parent: String,
        /// Child node name
        child: String,
        /// Edges actually removed
        removed: usize,
    },

    /// Child not registered under the parent
    #[error("{child} is not a child of {parent}")]
    UnknownChild {
        /// Parent node name
        parent: String,
        /// Child node name
        child: String,
    },

    /// Vertex has a parent but its tree state implies no parent edge
    #[error("{node} has a parent while in state {state:?}")]
    NoParentEdgeForState {
        /// Node name
        node: String,
        /// Tree state before the transition
        state: TreeState,
    },

    /// Parent-bearing tree state without a parent address
    #[error("{node} entered {state:?} without a parent")]
    MissingParent {
        /// Node name
        node: String,
        /// New tree state
        state: TreeState,
    },
}

/// Vertices, edges and the two lookup indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyGraph {
    vertices: IndexMap<VertexId, Vertex>,
    edges: BTreeSet<Edge>,
    by_name: HashMap<String, VertexId>,
    by_address: HashMap<Ipv4Addr, VertexId>,
    next_id: usize,
}

impl TopologyGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live vertex for a Hello.
    ///
    /// A name held by a dead vertex revives that vertex under the new
    /// address, so edges other vertices still hold towards it stay valid.
    ///
    /// # Errors
    ///
    /// Returns error if the name or the address belongs to a live vertex
    pub fn add_vertex(
        &mut self,
        node: &str,
        address: Ipv4Addr,
        location: Option<Location>,
    ) -> Result<VertexId, InvariantViolation> {
        let taken = self.live(self.by_name.get(node)) || self.live(self.by_address.get(&address));
        if taken {
            return Err(InvariantViolation::DuplicateVertex {
                node: node.to_string(),
                address,
            });
        }

        if let Some(id) = self.by_name.get(node).copied() {
            let vertex = self.vertex_mut(id)?;
            let previous = vertex.address;
            vertex.revive(address, location);
            if self.by_address.get(&previous) == Some(&id) {
                self.by_address.remove(&previous);
            }
            self.by_address.insert(address, id);
            tracing::trace!(vertex = %id, node, "Revived vertex");
            return Ok(id);
        }

        let id = VertexId(self.next_id);
        self.next_id += 1;
        self.vertices
            .insert(id, Vertex::new(id, node.to_string(), address, location));
        self.by_name.insert(node.to_string(), id);
        self.by_address.insert(address, id);
        Ok(id)
    }

    fn live(&self, id: Option<&VertexId>) -> bool {
        id.and_then(|id| self.vertices.get(id)).is_some_and(|v| v.alive)
    }

    /// Vertex currently bound to a node name
    ///
    /// # Errors
    ///
    /// Returns error if no vertex carries the name
    pub fn id_by_name(&self, node: &str) -> Result<VertexId, InvariantViolation> {
        self.by_name
            .get(node)
            .copied()
            .ok_or_else(|| InvariantViolation::UnknownNode { node: node.to_string() })
    }

    /// Vertex currently bound to an address
    ///
    /// # Errors
    ///
    /// Returns error if no vertex carries the address
    pub fn id_by_address(&self, address: Ipv4Addr) -> Result<VertexId, InvariantViolation> {
        self.by_address
            .get(&address)
            .copied()
            .ok_or(InvariantViolation::UnknownAddress { address })
    }

    /// Vertex by id, including dead ones
    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> Result<&mut Vertex, InvariantViolation> {
        match self.vertices.get_mut(&id) {
            Some(vertex) => Ok(vertex),
            None => Err(InvariantViolation::UnknownNode { node: id.to_string() }),
        }
    }

    /// Node name of a vertex, or its id if it was purged
    #[must_use]
    pub fn name_of(&self, id: VertexId) -> String {
        self.vertices
            .get(&id)
            .map_or_else(|| id.to_string(), |v| v.node.clone())
    }

    /// Vertices in creation order
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// Edges ordered by origin, destination, kind
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Number of vertices, dead ones included
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Insert an edge; returns false if it was already present
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        self.edges.insert(edge)
    }

    /// Remove an edge; returns false if it was absent
    pub fn remove_edge(&mut self, edge: &Edge) -> bool {
        self.edges.remove(edge)
    }

    /// Remove an edge that must exist
    ///
    /// # Errors
    ///
    /// Returns error if the edge is absent
    pub fn remove_existing_edge(&mut self, edge: &Edge) -> Result<(), InvariantViolation> {
        if self.edges.remove(edge) {
            return Ok(());
        }
        Err(InvariantViolation::MissingEdge {
            origin: self.name_of(edge.origin),
            destination: self.name_of(edge.destination),
            kind: edge.kind,
        })
    }

    /// Replace `previous` with `next` between the same endpoints
    ///
    /// # Errors
    ///
    /// Returns error if `previous` is absent; the graph is left unchanged
    pub fn replace_edge(&mut self, previous: &Edge, next: Edge) -> Result<(), InvariantViolation> {
        self.remove_existing_edge(previous)?;
        self.edges.insert(next);
        Ok(())
    }

    /// Edges leaving a vertex
    #[must_use]
    pub fn outgoing(&self, id: VertexId) -> Vec<Edge> {
        self.edges
            .range(Edge::new(id, VertexId(0), EdgeKind::ConnectingParent)..)
            .take_while(|e| e.origin == id)
            .copied()
            .collect()
    }

    /// Number of edges entering a vertex
    #[must_use]
    pub fn incoming_count(&self, id: VertexId) -> usize {
        self.edges.iter().filter(|e| e.destination == id).count()
    }

    /// Drop a vertex, every edge touching it, and its index entries
    pub fn remove_vertex(&mut self, id: VertexId) -> Option<Vertex> {
        let vertex = self.vertices.shift_remove(&id)?;
        self.edges.retain(|e| e.origin != id && e.destination != id);
        if self.by_name.get(&vertex.node) == Some(&id) {
            self.by_name.remove(&vertex.node);
        }
        if self.by_address.get(&vertex.address) == Some(&id) {
            self.by_address.remove(&vertex.address);
        }
        Some(vertex)
    }

    /// Remove everything, including the id counter
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

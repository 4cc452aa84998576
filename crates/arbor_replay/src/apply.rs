//! Transition function: apply one event to the topology graph.

use crate::engine::DeletionPolicy;
use crate::graph::{Edge, EdgeKind, InvariantViolation, TopologyGraph, VertexId};
use arbor_log::{ChildState, Event, EventPayload, TreeState};
use std::net::Ipv4Addr;

impl TopologyGraph {
    /// Apply one timeline event
    ///
    /// # Errors
    ///
    /// Returns the violated invariant; the graph must then be discarded
    pub fn apply(&mut self, event: &Event, policy: DeletionPolicy) -> Result<(), InvariantViolation> {
        match &event.payload {
            EventPayload::Hello { address, location } => {
                self.add_vertex(&event.node, *address, *location)?;
            }

            EventPayload::Goodbye => {
                let id = self.id_by_name(&event.node)?;
                self.vertex_mut(id)?.alive = false;
                for edge in self.outgoing(id) {
                    self.remove_edge(&edge);
                    self.check_if_can_delete(edge.destination, policy);
                }
                self.check_if_can_delete(id, policy);
            }

            EventPayload::ActiveViewChange { peer, added } => {
                self.toggle_view(&event.node, *peer, *added, EdgeKind::ActiveView)?;
            }

            EventPayload::PassiveViewChange { peer, added } => {
                self.toggle_view(&event.node, *peer, *added, EdgeKind::PassiveView)?;
            }

            EventPayload::ManagerStateChange { state } => {
                let id = self.id_by_name(&event.node)?;
                self.vertex_mut(id)?.manager_state = *state;
            }

            EventPayload::TreeStateChange {
                state,
                parent,
                grandparents,
            } => {
                let id = self.id_by_name(&event.node)?;
                self.change_tree_state(id, *state, *parent, grandparents, policy)?;
            }

            EventPayload::ParentMetadataUpdate { metadata } => {
                let id = self.id_by_name(&event.node)?;
                self.vertex_mut(id)?.parent_metadata = metadata.clone();
            }

            EventPayload::ChildStateChange { child, state } => {
                let id = self.id_by_name(&event.node)?;
                let child = self.id_by_address(*child)?;
                self.change_child_state(id, child, *state, policy)?;
            }

            EventPayload::ChildMetadataUpdate { child, metadata } => {
                let id = self.id_by_name(&event.node)?;
                let child = self.id_by_address(*child)?;
                let parent_name = self.name_of(id);
                let child_name = self.name_of(child);
                let entry = self
                    .vertex_mut(id)?
                    .children
                    .get_mut(&child)
                    .ok_or(InvariantViolation::UnknownChild {
                        parent: parent_name,
                        child: child_name,
                    })?;
                *entry = metadata.clone();
            }
        }
        Ok(())
    }

    fn toggle_view(
        &mut self,
        node: &str,
        peer: Ipv4Addr,
        added: bool,
        kind: EdgeKind,
    ) -> Result<(), InvariantViolation> {
        let id = self.id_by_name(node)?;
        let peer = self.id_by_address(peer)?;
        let edge = Edge::new(id, peer, kind);
        let vertex = self.vertex_mut(id)?;
        let peers = if kind == EdgeKind::ActiveView {
            &mut vertex.active
        } else {
            &mut vertex.passive
        };

        if added {
            peers.insert(peer);
            self.add_edge(edge);
            Ok(())
        } else {
            peers.remove(&peer);
            self.remove_existing_edge(&edge)
        }
    }

    fn resolve_all(&self, addresses: &[Ipv4Addr]) -> Result<Vec<VertexId>, InvariantViolation> {
        addresses
            .iter()
            .map(|address| self.id_by_address(*address))
            .collect()
    }

    fn change_tree_state(
        &mut self,
        id: VertexId,
        state: TreeState,
        parent: Option<Ipv4Addr>,
        grandparents: &[Ipv4Addr],
        policy: DeletionPolicy,
    ) -> Result<(), InvariantViolation> {
        let (old_state, old_parent) = {
            let vertex = self.vertex_mut(id)?;
            (vertex.tree_state, vertex.parent)
        };
        let missing_parent = || InvariantViolation::MissingParent {
            node: self.name_of(id),
            state,
        };

        match state {
            TreeState::ParentConnecting => {
                let new_parent = self.id_by_address(parent.ok_or_else(missing_parent)?)?;
                if let Some(old_parent) = old_parent {
                    let kind = self.parent_edge_kind(id, old_state)?;
                    self.remove_existing_edge(&Edge::new(id, old_parent, kind))?;
                }
                let grandparents = self.resolve_all(grandparents)?;
                self.add_edge(Edge::new(id, new_parent, EdgeKind::ConnectingParent));

                let vertex = self.vertex_mut(id)?;
                vertex.parent = Some(new_parent);
                vertex.grandparents = grandparents;
                vertex.parent_metadata.clear();
            }

            TreeState::ParentConnected | TreeState::ParentSync | TreeState::ParentReady => {
                let parent = self.id_by_address(parent.ok_or_else(missing_parent)?)?;
                let next = EdgeKind::for_tree_state(state).ok_or_else(missing_parent)?;
                // Ready may repeat to refresh grandparents; it replaces whatever
                // the previous state installed.
                let previous = if state == TreeState::ParentReady {
                    self.parent_edge_kind(id, old_state)?
                } else {
                    next.predecessor().ok_or_else(missing_parent)?
                };
                let grandparents = self.resolve_all(grandparents)?;
                self.replace_edge(&Edge::new(id, parent, previous), Edge::new(id, parent, next))?;

                let vertex = self.vertex_mut(id)?;
                vertex.grandparents = grandparents;
                vertex.parent_metadata.clear();
            }

            TreeState::Inactive => {
                if let Some(old_parent) = old_parent {
                    let kind = self.parent_edge_kind(id, old_state)?;
                    self.remove_existing_edge(&Edge::new(id, old_parent, kind))?;
                    self.check_if_can_delete(old_parent, policy);
                }
                let vertex = self.vertex_mut(id)?;
                vertex.parent = None;
                vertex.grandparents.clear();
                vertex.parent_metadata.clear();
            }

            TreeState::Datacenter => {
                let vertex = self.vertex_mut(id)?;
                vertex.grandparents.clear();
                vertex.parent_metadata.clear();
            }
        }

        self.vertex_mut(id)?.tree_state = state;
        Ok(())
    }

    fn parent_edge_kind(&self, id: VertexId, state: TreeState) -> Result<EdgeKind, InvariantViolation> {
        EdgeKind::for_tree_state(state).ok_or_else(|| InvariantViolation::NoParentEdgeForState {
            node: self.name_of(id),
            state,
        })
    }

    fn change_child_state(
        &mut self,
        id: VertexId,
        child: VertexId,
        state: ChildState,
        policy: DeletionPolicy,
    ) -> Result<(), InvariantViolation> {
        match state {
            ChildState::Connected => {
                self.add_edge(Edge::new(id, child, EdgeKind::ConnectedChild));
                self.vertex_mut(id)?.children.insert(child, String::new());
            }
            ChildState::Sync => {
                self.replace_edge(
                    &Edge::new(id, child, EdgeKind::ConnectedChild),
                    Edge::new(id, child, EdgeKind::SyncChild),
                )?;
            }
            ChildState::Ready => {
                self.replace_edge(
                    &Edge::new(id, child, EdgeKind::SyncChild),
                    Edge::new(id, child, EdgeKind::ReadyChild),
                )?;
            }
            ChildState::Disconnected => {
                let sync = self.remove_edge(&Edge::new(id, child, EdgeKind::SyncChild));
                let ready = self.remove_edge(&Edge::new(id, child, EdgeKind::ReadyChild));
                if sync == ready {
                    return Err(InvariantViolation::AmbiguousDisconnect {
                        parent: self.name_of(id),
                        child: self.name_of(child),
                        removed: usize::from(sync) + usize::from(ready),
                    });
                }
                if self.vertex_mut(id)?.children.remove(&child).is_none() {
                    return Err(InvariantViolation::UnknownChild {
                        parent: self.name_of(id),
                        child: self.name_of(child),
                    });
                }
                self.check_if_can_delete(child, policy);
            }
        }
        Ok(())
    }

    /// Purge a dead vertex nothing points at, when the policy allows it
    pub fn check_if_can_delete(&mut self, id: VertexId, policy: DeletionPolicy) {
        if policy == DeletionPolicy::Retain {
            return;
        }
        let dead = self.vertex(id).is_some_and(|v| !v.alive);
        if dead && self.incoming_count(id) == 0 {
            tracing::trace!(vertex = %self.name_of(id), "Purging isolated vertex");
            self.remove_vertex(id);
        }
    }
}

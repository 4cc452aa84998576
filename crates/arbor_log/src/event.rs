//! Event types for the node logs.
//!
//! Every parsed line becomes one [`Event`]; the variant lives in
//! [`EventPayload`] and is matched exhaustively by the replay engine.

use arbor_core::{CoreError, CoreResult, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Event kind - discriminant of [`EventPayload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Node joined
    Hello,
    /// Node left
    Goodbye,
    /// Active view gained or lost a peer
    ActiveViewChange,
    /// Passive view gained or lost a peer
    PassiveViewChange,
    /// Manager switched state
    ManagerStateChange,
    /// Node moved in the tree
    TreeStateChange,
    /// Metadata from the parent
    ParentMetadataUpdate,
    /// Parent-side child edge changed
    ChildStateChange,
    /// Metadata reported by a child
    ChildMetadataUpdate,
}

impl EventKind {
    /// Last event of a node's stream
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Goodbye)
    }

    /// Whether the kind anchors a stable period.
    ///
    /// Metadata updates and view toggles are too frequent to count.
    pub const fn is_structural(self) -> bool {
        !matches!(
            self,
            Self::ParentMetadataUpdate
                | Self::ChildMetadataUpdate
                | Self::ActiveViewChange
                | Self::PassiveViewChange
        )
    }

    /// Tag that introduces this kind in a log line
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Hello => "Hello",
            Self::Goodbye => "Goodbye",
            Self::ActiveViewChange => "ACTIVE",
            Self::PassiveViewChange => "PASSIVE",
            Self::ManagerStateChange => "MANAGER-STATE",
            Self::TreeStateChange => "TREE-STATE",
            Self::ParentMetadataUpdate => "PARENT-METADATA",
            Self::ChildStateChange => "CHILD",
            Self::ChildMetadataUpdate => "CHILD-METADATA",
        }
    }

    /// Resolve a log tag; unknown tags yield `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "Hello" => Self::Hello,
            "Goodbye" => Self::Goodbye,
            "ACTIVE" => Self::ActiveViewChange,
            "PASSIVE" => Self::PassiveViewChange,
            "MANAGER-STATE" => Self::ManagerStateChange,
            "TREE-STATE" => Self::TreeStateChange,
            "PARENT-METADATA" => Self::ParentMetadataUpdate,
            "CHILD" => Self::ChildStateChange,
            "CHILD-METADATA" => Self::ChildMetadataUpdate,
            _ => return None,
        };
        Some(kind)
    }
}

/// High-level state of a node's tree manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ManagerState {
    /// `INACTIVE`
    #[default]
    Inactive,
    /// `ACTIVE`
    Active,
}

impl ManagerState {
    /// Decode a `MANAGER-STATE` literal
    ///
    /// # Errors
    ///
    /// Returns error for unknown literals
    pub fn from_literal(literal: &str) -> CoreResult<Self> {
        match literal {
            "INACTIVE" => Ok(Self::Inactive),
            "ACTIVE" => Ok(Self::Active),
            _ => Err(CoreError::UnknownLiteral {
                field: "manager state",
                literal: literal.to_string(),
            }),
        }
    }

    /// Literal as written in the logs
    pub const fn literal(self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Active => "ACTIVE",
        }
    }
}

/// A node's position in the spanning tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TreeState {
    /// Not in the tree
    #[default]
    Inactive,
    /// Opening a connection to a parent
    ParentConnecting,
    /// Connected, not yet synchronised
    ParentConnected,
    /// Synchronising with the parent
    ParentSync,
    /// Attached and serving
    ParentReady,
    /// Tree root; has no parent
    Datacenter,
}

impl TreeState {
    /// Decode a `TREE-STATE` literal
    ///
    /// # Errors
    ///
    /// Returns error for unknown literals
    pub fn from_literal(literal: &str) -> CoreResult<Self> {
        match literal {
            "INACTIVE" => Ok(Self::Inactive),
            "PARENT_CONNECTING" => Ok(Self::ParentConnecting),
            "PARENT_CONNECTED" => Ok(Self::ParentConnected),
            "PARENT_SYNC" => Ok(Self::ParentSync),
            "PARENT_READY" => Ok(Self::ParentReady),
            "DATACENTER" => Ok(Self::Datacenter),
            _ => Err(CoreError::UnknownLiteral {
                field: "tree state",
                literal: literal.to_string(),
            }),
        }
    }

    /// Literal as written in the logs
    pub const fn literal(self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::ParentConnecting => "PARENT_CONNECTING",
            Self::ParentConnected => "PARENT_CONNECTED",
            Self::ParentSync => "PARENT_SYNC",
            Self::ParentReady => "PARENT_READY",
            Self::Datacenter => "DATACENTER",
        }
    }

    /// States that name a parent on the log line
    pub const fn has_parent(self) -> bool {
        !matches!(self, Self::Inactive | Self::Datacenter)
    }
}

/// State of the edge from a parent towards one child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChildState {
    /// Child opened a connection
    Connected,
    /// Child is synchronising
    Sync,
    /// Child is attached
    Ready,
    /// Child went away
    Disconnected,
}

impl ChildState {
    /// Decode a `CHILD` literal
    ///
    /// # Errors
    ///
    /// Returns error for unknown literals
    pub fn from_literal(literal: &str) -> CoreResult<Self> {
        match literal {
            "CONNECTED" => Ok(Self::Connected),
            "SYNC" => Ok(Self::Sync),
            "READY" => Ok(Self::Ready),
            "DISCONNECTED" => Ok(Self::Disconnected),
            _ => Err(CoreError::UnknownLiteral {
                field: "child state",
                literal: literal.to_string(),
            }),
        }
    }

    /// Literal as written in the logs
    pub const fn literal(self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::Sync => "SYNC",
            Self::Ready => "READY",
            Self::Disconnected => "DISCONNECTED",
        }
    }
}

/// 2-D placement announced in a Hello line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

/// Kind-specific payload of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Node joined
    Hello {
        /// Address the node listens on
        address: Ipv4Addr,
        /// Optional placement
        location: Option<Location>,
    },
    /// Node left; nothing follows in its file
    Goodbye,
    /// Active view toggled
    ActiveViewChange {
        /// Peer address
        peer: Ipv4Addr,
        /// `true` for Added, `false` for Removed
        added: bool,
    },
    /// Passive view toggled
    PassiveViewChange {
        /// Peer address
        peer: Ipv4Addr,
        /// `true` for Added, `false` for Removed
        added: bool,
    },
    /// Manager state change
    ManagerStateChange {
        /// New state
        state: ManagerState,
    },
    /// Tree state change
    TreeStateChange {
        /// New state
        state: TreeState,
        /// Parent address, present for the `PARENT_*` states
        parent: Option<Ipv4Addr>,
        /// Grandparent addresses, nearest first
        grandparents: Vec<Ipv4Addr>,
    },
    /// Metadata received from the parent
    ParentMetadataUpdate {
        /// Colon-separated entries
        metadata: Vec<String>,
    },
    /// Parent-side view of one child
    ChildStateChange {
        /// Child address
        child: Ipv4Addr,
        /// New state
        state: ChildState,
    },
    /// Metadata reported by one child
    ChildMetadataUpdate {
        /// Child address
        child: Ipv4Addr,
        /// Raw metadata token
        metadata: String,
    },
}

impl EventPayload {
    /// Discriminant of this payload
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Hello { .. } => EventKind::Hello,
            Self::Goodbye => EventKind::Goodbye,
            Self::ActiveViewChange { .. } => EventKind::ActiveViewChange,
            Self::PassiveViewChange { .. } => EventKind::PassiveViewChange,
            Self::ManagerStateChange { .. } => EventKind::ManagerStateChange,
            Self::TreeStateChange { .. } => EventKind::TreeStateChange,
            Self::ParentMetadataUpdate { .. } => EventKind::ParentMetadataUpdate,
            Self::ChildStateChange { .. } => EventKind::ChildStateChange,
            Self::ChildMetadataUpdate { .. } => EventKind::ChildMetadataUpdate,
        }
    }
}

impl fmt::Display for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hello { address, location } => {
                write!(f, "Hello {}", address)?;
                if let Some(loc) = location {
                    write!(f, " ({}, {})", loc.x, loc.y)?;
                }
                Ok(())
            }
            Self::Goodbye => write!(f, "Goodbye"),
            Self::ActiveViewChange { peer, added } => {
                write!(f, "Active {} {}", peer, if *added { "added" } else { "removed" })
            }
            Self::PassiveViewChange { peer, added } => {
                write!(f, "Passive {} {}", peer, if *added { "added" } else { "removed" })
            }
            Self::ManagerStateChange { state } => write!(f, "Manager {}", state.literal()),
            Self::TreeStateChange { state, parent, .. } => match parent {
                Some(parent) => write!(f, "Tree {} parent {}", state.literal(), parent),
                None => write!(f, "Tree {}", state.literal()),
            },
            Self::ParentMetadataUpdate { metadata } => {
                write!(f, "ParentMetadata [{}]", metadata.join(":"))
            }
            Self::ChildStateChange { child, state } => {
                write!(f, "Child {} is {}", child, state.literal())
            }
            Self::ChildMetadataUpdate { child, metadata } => {
                write!(f, "ChildMetadata {} {}", child, metadata)
            }
        }
    }
}

/// Where an event was read from.
///
/// Orders by file name then line number, which is the tie-break for events
/// sharing a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventOrigin {
    /// File name of the source log
    pub file: String,
    /// 1-based line number
    pub line: usize,
}

/// One parsed log event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the line was logged
    pub timestamp: Timestamp,
    /// Logical name of the emitting node
    pub node: String,
    /// Position in the merged timeline, unset until the merge
    pub index: Option<usize>,
    /// Source file and line
    pub origin: EventOrigin,
    /// Kind-specific data
    pub payload: EventPayload,
}

impl Event {
    /// Create an event not yet placed in a timeline
    #[must_use]
    pub fn new(
        timestamp: Timestamp,
        node: impl Into<String>,
        origin: EventOrigin,
        payload: EventPayload,
    ) -> Self {
        Self {
            timestamp,
            node: node.into(),
            index: None,
            origin,
            payload,
        }
    }

    /// Kind of the payload
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Whether this is a Goodbye
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// See [`EventKind::is_structural`]
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        self.kind().is_structural()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.timestamp.clock(), self.node, self.payload)
    }
}

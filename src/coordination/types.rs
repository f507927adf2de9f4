use std::fmt;

use serde::{Deserialize, Serialize};

pub type NodeId = u32;

/// Identity record of one server node. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
}

impl Node {
    pub fn new(id: NodeId, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.host, self.port)
    }
}

/// A node plus the split points it contributes to the hash ring.
///
/// The split points are generated once at join time and published to the
/// coordination service verbatim; they stay fixed for the node's entire
/// membership lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatedNode {
    pub node: Node,
    pub split_points: Vec<u32>,
}

impl CoordinatedNode {
    pub fn new(node: Node, mut split_points: Vec<u32>) -> Self {
        split_points.sort_unstable();
        split_points.dedup();
        Self { node, split_points }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }
}

impl fmt::Display for CoordinatedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.node, self.split_points)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Join,
    Leave,
}

/// A membership operation queued while the coordination service cannot
/// accept writes, replayed in FIFO order once it can.
#[derive(Debug, Clone)]
pub struct NodeOperation {
    pub node: CoordinatedNode,
    pub kind: OperationKind,
}

impl NodeOperation {
    pub fn join(node: CoordinatedNode) -> Self {
        Self {
            node,
            kind: OperationKind::Join,
        }
    }

    pub fn leave(node: CoordinatedNode) -> Self {
        Self {
            node,
            kind: OperationKind::Leave,
        }
    }
}

/// Connection state of the coordination-service session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    ReadOnly,
    Disconnected,
    Expired,
}

/// Notification delivered by a coordination backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    State(SessionState),
    ChildrenChanged,
}

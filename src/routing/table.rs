use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::coordination::types::{CoordinatedNode, Node, NodeId};
use crate::ring::{HashRing, PartitionRange, RingSnapshot};

/// One immutable routing view: the ring derived from a membership snapshot
/// plus the node-id lookup for turning owners into addresses.
#[derive(Debug)]
pub struct RoutingState {
    ring: RingSnapshot,
    nodes: HashMap<NodeId, Node>,
}

/// The node's current routing view, swapped wholesale on every membership
/// update and readable from any thread.
pub struct RoutingTable {
    ring: HashRing,
    state: RwLock<Option<Arc<RoutingState>>>,
}

impl RoutingTable {
    pub fn new(ring: HashRing) -> Arc<Self> {
        Arc::new(Self {
            ring,
            state: RwLock::new(None),
        })
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    /// Whether a membership snapshot has been received yet.
    pub fn has_snapshot(&self) -> bool {
        self.state.read().is_some()
    }

    /// Rebuilds the routing view from a membership snapshot and installs it.
    pub fn install(&self, nodes: &[CoordinatedNode]) {
        let snapshot = RingSnapshot::from_nodes(nodes);
        let addresses = nodes
            .iter()
            .map(|member| (member.id(), member.node.clone()))
            .collect();
        let state = Arc::new(RoutingState {
            ring: snapshot,
            nodes: addresses,
        });
        *self.state.write() = Some(state);
    }

    /// Looks up the node that currently owns a client id. Returns `None`
    /// until a membership snapshot has been received, or while the ring is
    /// empty — the caller answers `unknown` and the client retries.
    pub fn resolve(&self, client_id: u32) -> Option<Node> {
        let state = self.state.read().clone()?;
        let partition = self.ring.partition_of(client_id);
        let owner = state.ring.owner_of(partition).ok()?;
        state.nodes.get(&owner).cloned()
    }

    /// The contiguous partition ranges this node currently owns.
    pub fn owned_ranges(&self, node_id: NodeId) -> Vec<PartitionRange> {
        match self.state.read().clone() {
            Some(state) => state.ring.ranges_of(node_id, self.ring.partitions_count()),
            None => Vec::new(),
        }
    }
}

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::table::RoutingTable;
use crate::coordination::backend::CoordinationBackend;
use crate::coordination::types::{CoordinatedNode, Node};
use crate::coordination::Coordinator;
use crate::protocol::Frame;
use crate::relay::{RelayConsumer, RelayMessage};
use crate::server::Connections;

/// Ties the node together: joins the cluster, consumes membership updates,
/// reassigns the relay consumer, evicts revoked clients, and routes relayed
/// payloads to connections.
pub struct Orchestrator<B: CoordinationBackend> {
    local: Node,
    table: Arc<RoutingTable>,
    coordinator: Arc<Coordinator<B>>,
    connections: Arc<Connections>,
    consumer: Arc<dyn RelayConsumer>,
    membership: Mutex<Option<CoordinatedNode>>,
}

impl<B: CoordinationBackend> Orchestrator<B> {
    pub fn new(
        local: Node,
        table: Arc<RoutingTable>,
        coordinator: Arc<Coordinator<B>>,
        connections: Arc<Connections>,
        consumer: Arc<dyn RelayConsumer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            local,
            table,
            coordinator,
            connections,
            consumer,
            membership: Mutex::new(None),
        })
    }

    /// Generates this node's split points, joins the cluster, and starts
    /// consuming membership updates and relayed payloads.
    pub async fn start(self: &Arc<Self>, relay_rx: mpsc::UnboundedReceiver<RelayMessage>) {
        let split_points = self.table.ring().generate_split_points(self.local.id);
        let member = CoordinatedNode::new(self.local.clone(), split_points);
        *self.membership.lock() = Some(member.clone());

        self.coordinator.join(member).await;
        let mut updates = self.coordinator.subscribe().await;
        // The consumer starts with no partitions until the first snapshot.
        self.consumer.assign(Vec::new());

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(nodes) = updates.recv().await {
                orchestrator.on_state_update(nodes);
            }
            tracing::info!("Membership update stream closed");
        });

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut relay_rx = relay_rx;
            while let Some(message) = relay_rx.recv().await {
                orchestrator.on_relay_message(message);
            }
        });
    }

    /// Leaves the cluster. Used on graceful shutdown.
    pub async fn shutdown(&self) {
        let member = self.membership.lock().take();
        if let Some(member) = member {
            tracing::info!("Leaving cluster as {}", member);
            self.coordinator.leave(member).await;
        }
    }

    pub(crate) fn on_state_update(&self, nodes: Vec<CoordinatedNode>) {
        tracing::info!("Received membership update with {} nodes", nodes.len());
        self.table.install(&nodes);

        let ranges = self.table.owned_ranges(self.local.id);
        tracing::info!("Node {} now owns partition ranges {:?}", self.local.id, ranges);
        self.consumer.assign(ranges);

        self.evict_not_owned();
    }

    /// Drops every connected client whose id no longer resolves to this
    /// node under the new routing view.
    fn evict_not_owned(&self) {
        let mut evicted = 0;
        for client_id in self.connections.client_ids() {
            let still_owned = self
                .table
                .resolve(client_id)
                .map(|owner| owner.id == self.local.id)
                .unwrap_or(false);
            if !still_owned {
                self.connections.disconnect(client_id);
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::info!(
                "Evicted {} clients no longer owned by node {}",
                evicted,
                self.local.id
            );
        }
    }

    pub(crate) fn on_relay_message(&self, message: RelayMessage) {
        if !self
            .connections
            .send(message.client_id, Frame::data(message.payload))
        {
            tracing::debug!(
                "Dropping relayed payload for client {}: not connected here",
                message.client_id
            );
        }
    }
}

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::protocol::Frame;

/// Command delivered to a connection task through its channel.
#[derive(Debug)]
pub enum ConnCommand {
    Send(Frame),
    Close,
}

/// The clients this node currently owns, keyed by client id.
///
/// An entry appears when a resolve request confirms local ownership and
/// disappears on disconnect or loss of ownership. Every id in here resolves
/// to this node under the node's own routing view.
pub struct Connections {
    clients: DashMap<u32, mpsc::UnboundedSender<ConnCommand>>,
}

impl Connections {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clients: DashMap::new(),
        })
    }

    pub fn client_ids(&self) -> Vec<u32> {
        self.clients.iter().map(|entry| *entry.key()).collect()
    }

    pub fn contains(&self, client_id: u32) -> bool {
        self.clients.contains_key(&client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Queues a frame for a connected client. Returns false if the client is
    /// not connected to this node.
    pub fn send(&self, client_id: u32, frame: Frame) -> bool {
        match self.clients.get(&client_id) {
            Some(sender) => sender.send(ConnCommand::Send(frame)).is_ok(),
            None => false,
        }
    }

    /// Closes a client's connection and removes it from the registry. The
    /// entry is removed before the close is delivered, so nothing can be
    /// dispatched to the connection afterwards.
    pub fn disconnect(&self, client_id: u32) {
        if let Some((_, sender)) = self.clients.remove(&client_id) {
            tracing::info!("Disconnecting client {}", client_id);
            let _ = sender.send(ConnCommand::Close);
        }
    }

    /// Registers a client's connection, closing any stale connection that was
    /// still registered under the same id.
    pub(crate) fn register(&self, client_id: u32, sender: mpsc::UnboundedSender<ConnCommand>) {
        if let Some(previous) = self.clients.insert(client_id, sender) {
            tracing::info!(
                "Client {} reconnected, closing its previous connection",
                client_id
            );
            let _ = previous.send(ConnCommand::Close);
        }
    }

    /// Removes a client's entry, but only if it still points at the given
    /// channel. A newer connection registered under the same id stays.
    pub(crate) fn remove_if_current(
        &self,
        client_id: u32,
        sender: &mpsc::UnboundedSender<ConnCommand>,
    ) {
        self.clients
            .remove_if(&client_id, |_, current| current.same_channel(sender));
    }
}

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::mpsc;

use super::session;

/// Consecutive failed connection attempts a logical client tolerates before
/// it gives up.
pub const MAX_CONNECT_RETRIES: u32 = 3;

/// Command delivered to a client task.
#[derive(Debug)]
pub(crate) enum ClientCommand {
    Close,
}

/// Hosts the logical clients of one process and the timers that spawn and
/// decommission them.
pub struct ClientContainer {
    clients_count: u32,
    addresses: Vec<(String, u16)>,
    active: DashMap<u32, mpsc::UnboundedSender<ClientCommand>>,
}

impl ClientContainer {
    pub fn new(clients_count: u32, addresses: Vec<(String, u16)>) -> Arc<Self> {
        Arc::new(Self {
            clients_count,
            addresses,
            active: DashMap::new(),
        })
    }

    /// Starts the automatic spawn/decommission churn against random client
    /// ids, mirroring a population of clients coming and going.
    pub fn start(self: &Arc<Self>, spawn_delay: Duration, decommission_delay: Duration) {
        let container = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(spawn_delay);
            loop {
                ticker.tick().await;
                let client_id = rand::thread_rng().gen_range(0..container.clients_count);
                let (host, port) = container.random_address();
                container.spawn_client(client_id, host, port);
            }
        });
        let container = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(decommission_delay);
            loop {
                ticker.tick().await;
                let client_id = rand::thread_rng().gen_range(0..container.clients_count);
                container.decommission(client_id);
            }
        });
    }

    /// Spawns a logical client connecting to the given address. A client id
    /// that is already active is left alone.
    pub fn spawn_client(self: &Arc<Self>, client_id: u32, host: String, port: u16) {
        if self.active.contains_key(&client_id) {
            tracing::info!("Client {} is already connected", client_id);
            return;
        }
        tracing::info!("Spawning client {} against {}:{}", client_id, host, port);
        let (tx, rx) = mpsc::unbounded_channel();
        self.active.insert(client_id, tx.clone());
        let container = Arc::clone(self);
        tokio::spawn(async move {
            session::run(Arc::clone(&container), client_id, host, port, rx).await;
            container.active.remove_if(&client_id, |_, current| current.same_channel(&tx));
        });
    }

    /// Closes a logical client's connection and forgets it.
    pub fn decommission(&self, client_id: u32) {
        match self.active.remove(&client_id) {
            Some((_, sender)) => {
                tracing::info!("Decommissioning client {}", client_id);
                let _ = sender.send(ClientCommand::Close);
            }
            None => tracing::info!("Client {} is not active", client_id),
        }
    }

    /// Closes every active client.
    pub fn stop(&self) {
        tracing::info!("Stopping client container");
        for client_id in self.active_clients() {
            self.decommission(client_id);
        }
    }

    pub fn is_active(&self, client_id: u32) -> bool {
        self.active.contains_key(&client_id)
    }

    pub fn active_clients(&self) -> Vec<u32> {
        self.active.iter().map(|entry| *entry.key()).collect()
    }

    pub(crate) fn random_address(&self) -> (String, u16) {
        let idx = rand::thread_rng().gen_range(0..self.addresses.len());
        self.addresses[idx].clone()
    }
}
